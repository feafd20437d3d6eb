use bazaar_core::countdown::SystemClock;
use bazaar_core::{spawn_countdown, ClientConfig, CountdownEngine};

use crate::commands::common::{format_countdown_line, parse_deadline};
use crate::error::CliError;
use crate::settings::apply_cadence_flags;

/// Print the remaining time on every tick until the deadline passes or the
/// user interrupts.
pub async fn run_countdown(
    config: ClientConfig,
    deadline: &str,
    tick_ms: Option<u64>,
) -> Result<(), CliError> {
    let deadline = parse_deadline(deadline)?;
    let tick = apply_cadence_flags(config, tick_ms, None)?.countdown_tick();

    let engine = CountdownEngine::new(deadline).with_on_expire(|| {
        tracing::info!("Auction closed");
    });
    let mut handle = spawn_countdown(engine, SystemClock, tick);
    println!("{}", format_countdown_line(&handle.current()));

    loop {
        tokio::select! {
            state = handle.changed() => {
                let Some(state) = state else { break };
                println!("{}", format_countdown_line(&state));
                if state.expired {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                handle.cancel();
                break;
            }
        }
    }
    Ok(())
}
