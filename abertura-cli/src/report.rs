//! Text and CSV rendering of quotes and checkout views.

use std::io::Write;

use abertura_core::calculations::common::round_half_up;
use abertura_core::{PaymentResult, PaymentView, Quote};
use rust_decimal::Decimal;
use serde::Serialize;

/// Formats an amount as Brazilian reais, e.g. `R$ 1.049,00`.
pub fn format_brl(value: Decimal) -> String {
    let rounded = round_half_up(value);
    let negative = rounded.is_sign_negative() && !rounded.is_zero();
    let text = format!("{:.2}", rounded.abs());
    let (int_part, frac_part) = text.split_once('.').unwrap_or((text.as_str(), "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }

    let sign = if negative { "-" } else { "" };
    format!("{sign}R$ {grouped},{frac_part}")
}

/// Formats an optional amount, using "-" when `None`.
pub fn opt_brl(value: Option<Decimal>) -> String {
    value.map(format_brl).unwrap_or_else(|| "-".to_string())
}

/// Human-readable quote, one fact per line.
pub fn write_quote(
    out: &mut impl Write,
    quote: &Quote,
) -> std::io::Result<()> {
    writeln!(out, "Plano:            {}", quote.tier)?;
    match quote.review_reason {
        Some(reason) => writeln!(out, "Mensalidade:      sob consulta ({})", reason.message())?,
        None => writeln!(out, "Mensalidade:      {}", opt_brl(quote.monthly_value))?,
    }
    writeln!(out, "Taxa de abertura: {}", format_brl(quote.one_time_setup_fee))?;
    if quote.free_registration {
        writeln!(out, "Abertura gratuita (PR ou endereço fiscal)")?;
    }
    if quote.review_reason.is_none() {
        let b = &quote.breakdown;
        writeln!(out, "  base:              {}", format_brl(b.base_value))?;
        writeln!(out, "  funcionários:      {}", format_brl(b.employee_surcharge))?;
        writeln!(out, "  endereço fiscal:   {}", format_brl(b.fiscal_address_surcharge))?;
    }
    Ok(())
}

pub fn write_payment_view(
    out: &mut impl Write,
    view: &PaymentView,
) -> std::io::Result<()> {
    match view {
        PaymentView::Blocked { quote } => {
            writeln!(out, "Pagamento online indisponível: plano {}.", quote.tier)?;
            writeln!(out, "Um consultor enviará a proposta.")
        }
        PaymentView::Checkout {
            monthly, setup_fee, ..
        } => {
            writeln!(out, "Mensalidade:      {}", format_brl(*monthly))?;
            writeln!(out, "Taxa de abertura: {}", format_brl(*setup_fee))?;
            writeln!(out, "Total a pagar:    {}", format_brl(*monthly + *setup_fee))
        }
    }
}

pub fn write_payment_result(
    out: &mut impl Write,
    result: &PaymentResult,
) -> std::io::Result<()> {
    write!(out, "Pagamento {:?}", result.status)?;
    if let Some(tx) = &result.transaction_id {
        write!(out, " (transação {tx})")?;
    }
    if let Some(message) = &result.message {
        write!(out, ": {message}")?;
    }
    writeln!(out)
}

/// One output row of `quote-batch`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchLine {
    pub name: String,
    pub tier: Option<String>,
    pub monthly_value: Option<Decimal>,
    pub one_time_setup_fee: Option<Decimal>,
    pub first_charge: Option<Decimal>,
    pub note: String,
}

impl BatchLine {
    pub fn from_quote(
        name: String,
        quote: Option<&Quote>,
    ) -> Self {
        match quote {
            Some(q) => Self {
                name,
                tier: Some(q.tier.to_string()),
                monthly_value: q.monthly_value,
                one_time_setup_fee: Some(q.one_time_setup_fee),
                first_charge: q.first_charge(),
                note: q
                    .review_reason
                    .map(|r| r.message().to_string())
                    .unwrap_or_default(),
            },
            None => Self {
                name,
                tier: None,
                monthly_value: None,
                one_time_setup_fee: None,
                first_charge: None,
                note: "revenue missing or not a number".to_string(),
            },
        }
    }
}

/// Writes the batch as CSV with a header row.
pub fn write_batch_csv(
    out: impl Write,
    lines: &[BatchLine],
) -> Result<(), csv::Error> {
    let mut writer = csv::Writer::from_writer(out);
    for line in lines {
        writer.serialize(line)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use abertura_core::calculations::compute_quote;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn brl_groups_thousands_with_dots() {
        assert_eq!(format_brl(dec!(0)), "R$ 0,00");
        assert_eq!(format_brl(dec!(199)), "R$ 199,00");
        assert_eq!(format_brl(dec!(1049)), "R$ 1.049,00");
        assert_eq!(format_brl(dec!(1234567.891)), "R$ 1.234.567,89");
        assert_eq!(format_brl(dec!(-50.5)), "-R$ 50,50");
    }

    #[test]
    fn opt_brl_uses_dash_for_none() {
        assert_eq!(opt_brl(None), "-");
        assert_eq!(opt_brl(Some(dec!(499))), "R$ 499,00");
    }

    #[test]
    fn review_quote_says_sob_consulta() {
        let quote = compute_quote(Some(dec!(400000)), 0, false, "SP").unwrap();
        let mut out = Vec::new();

        write_quote(&mut out, &quote).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.contains("ANALISE_COMERCIAL"));
        assert!(text.contains("sob consulta"));
        assert!(!text.contains("base:"));
    }

    #[test]
    fn checkout_view_shows_total() {
        let view = PaymentView::Checkout {
            quote: compute_quote(Some(dec!(20000)), 0, false, "SP").unwrap(),
            monthly: dec!(199),
            setup_fee: dec!(850),
        };
        let mut out = Vec::new();

        write_payment_view(&mut out, &view).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.contains("Total a pagar:    R$ 1.049,00"), "{text}");
    }

    #[test]
    fn batch_line_without_quote_has_blank_prices() {
        let line = BatchLine::from_quote("Sem Valor".to_string(), None);

        let mut out = Vec::new();
        write_batch_csv(&mut out, &[line]).unwrap();

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "name,tier,monthly_value,one_time_setup_fee,first_charge,note\n\
             Sem Valor,,,,,revenue missing or not a number\n"
        );
    }
}
