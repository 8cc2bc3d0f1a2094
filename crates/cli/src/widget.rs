//! Payment widget that collects the provider's reply on the terminal.
//!
//! Shows the provider order reference, key and amount, then reads the
//! provider payment id and signature from stdin. An empty payment id reports
//! a failure; closing stdin abandons the payment.

use std::io::{self, BufRead, Write};

use lustre_core::checkout::{PaymentProof, ProviderError};
use lustre_storefront::checkout::{PaymentCallback, PaymentOutcome, PaymentRequest, PaymentWidget};
use tracing::warn;

pub struct TerminalWidget;

impl PaymentWidget for TerminalWidget {
    fn open(&self, request: PaymentRequest, callback: PaymentCallback) {
        tokio::task::spawn_blocking(move || {
            match prompt(&request, &mut io::stdin().lock(), &mut io::stdout().lock()) {
                Ok(Some(reply)) => callback.report(reply),
                Ok(None) => drop(callback),
                Err(err) => {
                    warn!(error = %err, "payment prompt failed");
                    drop(callback);
                }
            }
        });
    }
}

/// Run the prompt. `Ok(None)` means input ended before a reply.
fn prompt(
    request: &PaymentRequest,
    input: &mut impl BufRead,
    out: &mut impl Write,
) -> io::Result<Option<PaymentOutcome>> {
    writeln!(out, "Pay {} for order {}", request.amount, request.order)?;
    writeln!(out, "  provider order: {}", request.provider_order_id)?;
    writeln!(out, "  provider key:   {}", request.provider_key)?;
    write!(out, "Payment id (empty to cancel): ")?;
    out.flush()?;

    let Some(payment_id) = read_line(input)? else {
        return Ok(None);
    };
    if payment_id.is_empty() {
        return Ok(Some(PaymentOutcome::Failed(ProviderError {
            code: None,
            description: "Payment cancelled".to_string(),
        })));
    }

    write!(out, "Signature: ")?;
    out.flush()?;
    let Some(signature) = read_line(input)? else {
        return Ok(None);
    };

    Ok(Some(PaymentOutcome::Succeeded(PaymentProof {
        provider_payment_id: payment_id,
        provider_order_id: request.provider_order_id.clone(),
        provider_signature: signature,
    })))
}

fn read_line(input: &mut impl BufRead) -> io::Result<Option<String>> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use lustre_core::{CurrencyCode, OrderHandle, Price};
    use rust_decimal::Decimal;

    use super::*;

    fn request() -> PaymentRequest {
        PaymentRequest {
            order: "8f14e45f-ceea-467f-a0e6-2a1f5c3e9b10".parse::<OrderHandle>().unwrap(),
            provider_order_id: "order_Nx1".to_string(),
            provider_key: "rzp_test_key".to_string(),
            amount: Price::new(Decimal::new(2_500, 0), CurrencyCode::INR),
            amount_minor: 250_000,
        }
    }

    #[test]
    fn test_prompt_reads_proof() {
        let mut input = "pay_123\nsig_abc\n".as_bytes();
        let mut out = Vec::new();
        let outcome = prompt(&request(), &mut input, &mut out).unwrap().unwrap();

        assert_eq!(
            outcome,
            PaymentOutcome::Succeeded(PaymentProof {
                provider_payment_id: "pay_123".to_string(),
                provider_order_id: "order_Nx1".to_string(),
                provider_signature: "sig_abc".to_string(),
            })
        );
        let shown = String::from_utf8(out).unwrap();
        assert!(shown.contains("₹2500.00"));
    }

    #[test]
    fn test_empty_payment_id_is_failure() {
        let mut input = "\n".as_bytes();
        let outcome = prompt(&request(), &mut input, &mut Vec::new()).unwrap().unwrap();
        assert!(matches!(outcome, PaymentOutcome::Failed(_)));
    }

    #[test]
    fn test_closed_input_abandons() {
        let mut input = "pay_123\n".as_bytes();
        assert!(prompt(&request(), &mut input, &mut Vec::new()).unwrap().is_none());
    }
}
