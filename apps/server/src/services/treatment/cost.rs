//! Treatment cost calculation
//!
//! Every line costs `unit price x doses per day x days`. Custom medications
//! replace the protocol line for the same medicine and add the rest.

use crate::{
    models::{CustomMedication, Medicine, ProtocolWithMedicines},
    Error, Result,
};
use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LineSource {
    Protocol,
    Custom,
}

/// Where a line's day count came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DaysBasis {
    LineDuration,
    TreatmentSpan,
    ProtocolDuration,
    Default,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CostLine {
    pub source: LineSource,
    pub medicine_id: Option<Uuid>,
    pub name: String,
    pub frequency: String,
    pub doses_per_day: Decimal,
    pub days: i64,
    pub days_basis: DaysBasis,
    pub unit_price: Decimal,
    pub subtotal: Decimal,
    /// Set on a custom line that replaced a protocol line.
    pub overrides_protocol_line: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CostBreakdown {
    pub lines: Vec<CostLine>,
    pub total: Decimal,
}

/// Round a money amount to cents, halves away from zero.
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Upper bound on parsed doses per day (hourly dosing).
pub const MAX_DOSES_PER_DAY: u32 = 24;

/// Doses per day for a free-text frequency, capped at [`MAX_DOSES_PER_DAY`];
/// unknown text counts as once a day.
pub fn doses_per_day(frequency: &str) -> Decimal {
    parse_doses_per_day(frequency).min(Decimal::from(MAX_DOSES_PER_DAY))
}

fn parse_doses_per_day(frequency: &str) -> Decimal {
    let text = frequency.trim().to_lowercase();
    let tokens: Vec<&str> = text
        .split(|c: char| !c.is_ascii_alphanumeric() && c != '.')
        .filter(|t| !t.is_empty())
        .collect();
    let has = |word: &str| tokens.contains(&word);
    let weekly = text.contains("weekly") || text.contains("a week") || text.contains("per week") || text.contains("/week");

    if let Some(hours) = text
        .strip_prefix("every ")
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|n| n.parse::<Decimal>().ok())
        .filter(|n| *n > Decimal::ZERO && text.contains("hour"))
    {
        return Decimal::from(24)
            .checked_div(hours)
            .unwrap_or(Decimal::from(MAX_DOSES_PER_DAY));
    }

    let leading: String = text
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    if let Ok(count) = leading.parse::<Decimal>() {
        if count > Decimal::ZERO {
            return if weekly {
                count / Decimal::from(7)
            } else {
                count
            };
        }
    }

    if text.contains("every other day") || text.contains("alternate day") {
        Decimal::new(5, 1)
    } else if weekly {
        Decimal::ONE / Decimal::from(7)
    } else if has("qid") || text.contains("four times") {
        Decimal::from(4)
    } else if has("tid") || text.contains("three times") || text.contains("thrice") {
        Decimal::from(3)
    } else if has("bid") || text.contains("twice") || text.contains("two times") {
        Decimal::from(2)
    } else {
        // once, od, qd, daily and anything unrecognised
        Decimal::ONE
    }
}

/// Inputs that decide how many days a line without its own duration is charged.
#[derive(Debug, Clone, Copy)]
pub struct Span {
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub protocol_days: Option<i32>,
}

#[derive(Debug, Clone)]
pub struct CostCalculator {
    default_duration_days: i64,
}

impl CostCalculator {
    pub fn new(default_duration_days: u32) -> Self {
        Self {
            default_duration_days: i64::from(default_duration_days.max(1)),
        }
    }

    fn days_for(&self, line_days: Option<i64>, span: Span) -> (i64, DaysBasis) {
        if let Some(days) = line_days.filter(|d| *d > 0) {
            return (days, DaysBasis::LineDuration);
        }
        if let Some(end) = span.end_date {
            let days = (end - span.start_date).num_days() + 1;
            if days > 0 {
                return (days, DaysBasis::TreatmentSpan);
            }
        }
        if let Some(days) = span.protocol_days.filter(|d| *d > 0) {
            return (i64::from(days), DaysBasis::ProtocolDuration);
        }
        (self.default_duration_days, DaysBasis::Default)
    }

    /// Price the protocol and custom lines. `catalogue` resolves prices for
    /// custom medications that reference a medicine without their own price.
    pub fn calculate(
        &self,
        protocol: Option<&ProtocolWithMedicines>,
        custom: &[CustomMedication],
        catalogue: &HashMap<Uuid, Medicine>,
        start_date: NaiveDate,
        end_date: Option<NaiveDate>,
    ) -> Result<CostBreakdown> {
        let span = Span {
            start_date,
            end_date,
            protocol_days: protocol.and_then(|p| p.protocol.duration_days),
        };

        let overrides = |medicine_id: Uuid, name: &str| {
            custom.iter().position(|c| {
                c.medicine_id == Some(medicine_id)
                    || (c.medicine_id.is_none() && c.name.trim().eq_ignore_ascii_case(name.trim()))
            })
        };

        let mut lines = Vec::new();
        let mut overriding: Vec<usize> = Vec::new();
        let mut protocol_prices: HashMap<Uuid, Decimal> = HashMap::new();

        for line in protocol.map(|p| p.medicines.as_slice()).unwrap_or_default() {
            protocol_prices.insert(line.medicine.id, line.medicine.unit_price);
            if let Some(index) = overrides(line.medicine.id, &line.medicine.name) {
                overriding.push(index);
                continue;
            }
            let per_day = doses_per_day(&line.item.frequency);
            let (days, basis) = self.days_for(line.item.duration_days(), span);
            lines.push(line_cost(
                LineSource::Protocol,
                Some(line.medicine.id),
                line.medicine.name.clone(),
                line.item.frequency.clone(),
                per_day,
                days,
                basis,
                line.medicine.unit_price,
                false,
            )?);
        }

        for (index, medication) in custom.iter().enumerate() {
            let unit_price = medication
                .price
                .or_else(|| {
                    medication.medicine_id.and_then(|id| {
                        catalogue
                            .get(&id)
                            .map(|m| m.unit_price)
                            .or_else(|| protocol_prices.get(&id).copied())
                    })
                })
                .unwrap_or(Decimal::ZERO);
            let per_day = doses_per_day(&medication.frequency);
            let (days, basis) = self.days_for(Some(medication.duration_days()), span);
            lines.push(line_cost(
                LineSource::Custom,
                medication.medicine_id,
                medication.name.clone(),
                medication.frequency.clone(),
                per_day,
                days,
                basis,
                unit_price,
                overriding.contains(&index),
            )?);
        }

        let total = lines
            .iter()
            .try_fold(Decimal::ZERO, |acc, l| acc.checked_add(l.subtotal))
            .ok_or_else(|| Error::Validation("Treatment cost is out of range".to_string()))?;
        Ok(CostBreakdown {
            lines,
            total: round_money(total),
        })
    }
}

fn line_cost(
    source: LineSource,
    medicine_id: Option<Uuid>,
    name: String,
    frequency: String,
    doses_per_day: Decimal,
    days: i64,
    days_basis: DaysBasis,
    unit_price: Decimal,
    overrides_protocol_line: bool,
) -> Result<CostLine> {
    let subtotal = unit_price
        .checked_mul(doses_per_day)
        .and_then(|amount| amount.checked_mul(Decimal::from(days)))
        .ok_or_else(|| Error::Validation(format!("Cost of {name} is out of range")))?;
    Ok(CostLine {
        source,
        medicine_id,
        name,
        frequency,
        doses_per_day,
        days,
        days_basis,
        unit_price,
        subtotal: round_money(subtotal),
        overrides_protocol_line,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        protocol::ProtocolMedicineLine, DurationUnit, ProtocolCategory, ProtocolMedicine,
        TreatmentProtocol,
    };
    use chrono::Utc;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, d).unwrap()
    }

    fn medicine(name: &str, price: &str) -> Medicine {
        Medicine {
            id: Uuid::new_v4(),
            name: name.to_string(),
            strength: None,
            unit: "tablet".to_string(),
            unit_price: dec(price),
            created_at: Utc::now(),
        }
    }

    fn protocol(lines: Vec<(Medicine, &str, Option<(i32, DurationUnit)>)>, days: Option<i32>) -> ProtocolWithMedicines {
        let id = Uuid::new_v4();
        ProtocolWithMedicines {
            protocol: TreatmentProtocol {
                id,
                name: "TLD".to_string(),
                description: None,
                category: ProtocolCategory::FirstLine,
                duration_days: days,
                created_at: Utc::now(),
            },
            medicines: lines
                .into_iter()
                .map(|(medicine, frequency, duration)| ProtocolMedicineLine {
                    item: ProtocolMedicine {
                        id: Uuid::new_v4(),
                        protocol_id: id,
                        medicine_id: medicine.id,
                        dosage: "1 tablet".to_string(),
                        frequency: frequency.to_string(),
                        duration_value: duration.map(|d| d.0),
                        duration_unit: duration.map(|d| d.1),
                        notes: None,
                    },
                    medicine,
                })
                .collect(),
        }
    }

    fn custom(name: &str, medicine_id: Option<Uuid>, frequency: &str, value: i32, unit: DurationUnit, price: Option<&str>) -> CustomMedication {
        CustomMedication {
            medicine_id,
            name: name.to_string(),
            dosage: "1 tablet".to_string(),
            frequency: frequency.to_string(),
            duration_value: value,
            duration_unit: unit,
            price: price.map(dec),
            schedule: None,
            notes: None,
        }
    }

    #[test]
    fn frequency_keywords() {
        assert_eq!(doses_per_day("Once daily"), dec("1"));
        assert_eq!(doses_per_day("BID"), dec("2"));
        assert_eq!(doses_per_day("twice a day"), dec("2"));
        assert_eq!(doses_per_day("tid"), dec("3"));
        assert_eq!(doses_per_day("four times daily"), dec("4"));
        assert_eq!(doses_per_day("every other day"), dec("0.5"));
        assert_eq!(doses_per_day("weekly"), Decimal::ONE / Decimal::from(7));
        assert_eq!(doses_per_day("2 times/day"), dec("2"));
        assert_eq!(doses_per_day("every 8 hours"), dec("3"));
        assert_eq!(doses_per_day("as directed"), dec("1"));
    }

    #[test]
    fn doses_per_day_is_capped() {
        assert_eq!(doses_per_day("9999999999999999999999999 times daily"), dec("24"));
        assert_eq!(doses_per_day("every 0.0000000000000000000000001 hours"), dec("24"));
    }

    #[test]
    fn overflowing_line_is_rejected_not_panicking() {
        let calc = CostCalculator::new(30);
        let p = protocol(vec![(medicine("TLD", "1.00"), "once daily", None)], None);
        let custom = vec![custom(
            "TLD",
            None,
            "9999999999999999999999999 times daily",
            3650,
            DurationUnit::Month,
            Some("79228162514264337593543950"),
        )];
        let result = calc.calculate(Some(&p), &custom, &HashMap::new(), date(1, 1), None);
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[test]
    fn span_drives_days_when_lines_have_no_duration() {
        let calc = CostCalculator::new(30);
        let p = protocol(vec![(medicine("TLD", "1.50"), "once daily", None)], Some(90));
        let breakdown = calc.calculate(Some(&p), &[], &HashMap::new(), date(1, 1), Some(date(1, 28))).unwrap();
        assert_eq!(breakdown.lines[0].days, 28);
        assert_eq!(breakdown.lines[0].days_basis, DaysBasis::TreatmentSpan);
        assert_eq!(breakdown.total, dec("42.00"));
    }

    #[test]
    fn fallback_order_line_then_protocol_then_default() {
        let calc = CostCalculator::new(30);
        let p = protocol(
            vec![
                (medicine("A", "1"), "once daily", Some((2, DurationUnit::Week))),
                (medicine("B", "1"), "once daily", None),
            ],
            Some(60),
        );
        let breakdown = calc.calculate(Some(&p), &[], &HashMap::new(), date(1, 1), None).unwrap();
        assert_eq!(breakdown.lines[0].days, 14);
        assert_eq!(breakdown.lines[1].days, 60);

        let p = protocol(vec![(medicine("C", "2"), "bid", None)], None);
        let breakdown = calc.calculate(Some(&p), &[], &HashMap::new(), date(1, 1), None).unwrap();
        assert_eq!(breakdown.lines[0].days_basis, DaysBasis::Default);
        assert_eq!(breakdown.total, dec("120.00"));
    }

    #[test]
    fn custom_line_overrides_protocol_line_by_name() {
        let calc = CostCalculator::new(30);
        let p = protocol(
            vec![
                (medicine("Dolutegravir", "3.00"), "once daily", None),
                (medicine("Lamivudine", "0.50"), "once daily", None),
            ],
            None,
        );
        let custom = vec![
            custom("dolutegravir", None, "twice daily", 10, DurationUnit::Day, Some("2.00")),
            custom("Vitamin B6", None, "once daily", 1, DurationUnit::Month, Some("0.10")),
        ];
        let breakdown = calc.calculate(Some(&p), &custom, &HashMap::new(), date(1, 1), None).unwrap();
        assert_eq!(breakdown.lines.len(), 3);
        assert_eq!(breakdown.lines[0].name, "Lamivudine");
        assert!(breakdown.lines[1].overrides_protocol_line);
        assert!(!breakdown.lines[2].overrides_protocol_line);
        // 0.50*30 + 2.00*2*10 + 0.10*30
        assert_eq!(breakdown.total, dec("58.00"));
    }

    #[test]
    fn custom_price_falls_back_to_catalogue_then_zero() {
        let calc = CostCalculator::new(30);
        let catalogue_medicine = medicine("Cotrimoxazole", "0.25");
        let catalogue = HashMap::from([(catalogue_medicine.id, catalogue_medicine.clone())]);
        let custom = vec![
            custom("Cotrimoxazole", Some(catalogue_medicine.id), "once daily", 4, DurationUnit::Day, None),
            custom("Unknown", None, "once daily", 4, DurationUnit::Day, None),
        ];
        let breakdown = calc.calculate(None, &custom, &catalogue, date(1, 1), None).unwrap();
        assert_eq!(breakdown.lines[0].subtotal, dec("1.00"));
        assert_eq!(breakdown.lines[1].subtotal, Decimal::ZERO);
    }

    #[test]
    fn totals_round_to_cents() {
        let calc = CostCalculator::new(30);
        let p = protocol(vec![(medicine("Weekly", "1.00"), "weekly", Some((1, DurationUnit::Month)))], None);
        let breakdown = calc.calculate(Some(&p), &[], &HashMap::new(), date(1, 1), None).unwrap();
        // 30 / 7 = 4.2857...
        assert_eq!(breakdown.total, dec("4.29"));
    }
}
