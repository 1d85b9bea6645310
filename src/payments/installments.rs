//! Installment plan labels in Brazilian Portuguese.

use serde::Serialize;
use utoipa::ToSchema;

use crate::{domain::from_cents, payments::InstallmentOption};

/// Formats cents as BRL currency, e.g. `R$ 1.234,56`.
pub fn format_brl(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let cents = cents.unsigned_abs();
    let reais = (cents / 100).to_string();
    let centavos = cents % 100;

    let mut grouped = String::with_capacity(reais.len() + reais.len() / 3);
    for (i, digit) in reais.chars().enumerate() {
        if i > 0 && (reais.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(digit);
    }

    format!("{}R$ {},{:02}", sign, grouped, centavos)
}

pub fn installment_label(
    installments: u32,
    installment_amount_cents: i64,
    total_amount_cents: i64,
    installment_rate: f64,
) -> String {
    if installments <= 1 {
        return format!("À vista: {}", format_brl(total_amount_cents));
    }

    if installment_rate == 0.0 {
        format!(
            "{}x de {} sem juros",
            installments,
            format_brl(installment_amount_cents)
        )
    } else {
        format!(
            "{}x de {} (total {})",
            installments,
            format_brl(installment_amount_cents),
            format_brl(total_amount_cents)
        )
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct InstallmentView {
    pub installments: u32,
    pub installment_amount: f64,
    pub total_amount: f64,
    pub recommended_message: String,
    pub labels: Vec<String>,
}

impl From<InstallmentOption> for InstallmentView {
    fn from(option: InstallmentOption) -> Self {
        let recommended_message = installment_label(
            option.installments,
            option.installment_amount_cents,
            option.total_amount_cents,
            option.installment_rate,
        );

        Self {
            installments: option.installments,
            installment_amount: from_cents(option.installment_amount_cents),
            total_amount: from_cents(option.total_amount_cents),
            recommended_message,
            labels: option.labels,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_currency_with_brazilian_separators() {
        assert_eq!(format_brl(10000), "R$ 100,00");
        assert_eq!(format_brl(3333), "R$ 33,33");
        assert_eq!(format_brl(5), "R$ 0,05");
        assert_eq!(format_brl(123456789), "R$ 1.234.567,89");
        assert_eq!(format_brl(100000), "R$ 1.000,00");
        assert_eq!(format_brl(-2550), "-R$ 25,50");
    }

    #[test]
    fn single_installment_is_a_vista() {
        assert_eq!(installment_label(1, 10000, 10000, 0.0), "À vista: R$ 100,00");
    }

    #[test]
    fn interest_free_plan() {
        assert_eq!(installment_label(3, 3333, 10000, 0.0), "3x de R$ 33,33 sem juros");
    }

    #[test]
    fn plan_with_interest_shows_total() {
        assert_eq!(
            installment_label(3, 3500, 10500, 4.99),
            "3x de R$ 35,00 (total R$ 105,00)"
        );
    }

    #[test]
    fn wording_boundary_at_two_installments() {
        assert_eq!(installment_label(2, 5000, 10000, 0.0), "2x de R$ 50,00 sem juros");
    }

    #[test]
    fn view_uses_formatted_message() {
        let view = InstallmentView::from(InstallmentOption {
            installments: 1,
            installment_rate: 0.0,
            installment_amount_cents: 10000,
            total_amount_cents: 10000,
            labels: vec![],
        });

        assert_eq!(view.recommended_message, "À vista: R$ 100,00");
        assert_eq!(view.total_amount, 100.0);
    }
}
