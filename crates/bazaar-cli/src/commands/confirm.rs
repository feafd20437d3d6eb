use bazaar_core::{ClientConfig, ConfirmationFlow, ConfirmationStatus};

use crate::commands::common::{confirmation_item, format_confirmation_lines, open_storefront};
use crate::error::CliError;

pub async fn run_confirm(
    config: ClientConfig,
    transaction_id: &str,
    session_id: Option<&str>,
    as_json: bool,
) -> Result<(), CliError> {
    let transaction_id = transaction_id.trim();
    if transaction_id.is_empty() {
        return Err(CliError::EmptyTransactionId);
    }

    let storefront = open_storefront(config).await?;
    let flow = ConfirmationFlow::new(storefront.api, storefront.session);
    let ticket = flow.mount(transaction_id, session_id).await;

    if as_json {
        let item = confirmation_item(transaction_id, &ticket);
        println!("{}", serde_json::to_string_pretty(&item)?);
    } else {
        for line in format_confirmation_lines(transaction_id, &ticket) {
            println!("{line}");
        }
    }

    if ticket.status == ConfirmationStatus::Unconfirmed {
        return Err(CliError::PaymentUnconfirmed(
            ticket.failure.unwrap_or_else(|| "unknown error".to_string()),
        ));
    }
    Ok(())
}
