use bazaar_core::{ClientConfig, NotificationCounter};

use crate::commands::common::open_storefront;
use crate::error::CliError;
use crate::settings::apply_cadence_flags;

pub async fn run_notifications(
    config: ClientConfig,
    interval_ms: Option<u64>,
    once: bool,
) -> Result<(), CliError> {
    let config = apply_cadence_flags(config, None, interval_ms)?;
    let interval = config.notification_poll_interval();
    let storefront = open_storefront(config).await?;
    storefront.session.authorize()?;

    let mut counter = NotificationCounter::start(storefront.api, storefront.session, interval);
    let mut last_printed = None;

    loop {
        tokio::select! {
            snapshot = counter.changed() => {
                let Some(snapshot) = snapshot else { break };
                let Some(total) = snapshot.value else { continue };
                if last_printed != Some(total) {
                    println!("{total} unread");
                    last_printed = Some(total);
                }
                if once {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    counter.stop();
    Ok(())
}
