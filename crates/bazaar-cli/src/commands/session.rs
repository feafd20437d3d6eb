use bazaar_core::{ClientConfig, LoginCredentials, RegisterOutcome, Registration};

use crate::commands::common::{format_status_line, open_storefront, status_item};
use crate::error::CliError;

pub async fn run_login(config: ClientConfig, email: &str, password: &str) -> Result<(), CliError> {
    let storefront = open_storefront(config).await?;
    let user = storefront
        .session
        .login(&LoginCredentials::new(email, password))
        .await?;
    println!("Signed in as {} <{}>", user.label(), user.email);
    Ok(())
}

pub async fn run_register(
    config: ClientConfig,
    email: &str,
    password: &str,
    name: Option<String>,
) -> Result<(), CliError> {
    let storefront = open_storefront(config).await?;
    let registration = Registration {
        email: email.trim().to_string(),
        password: password.to_string(),
        name: bazaar_core::util::normalize_text_option(name),
    };

    match storefront.session.register(&registration).await? {
        RegisterOutcome::SignedIn(user) => {
            println!("Account created. Signed in as {} <{}>", user.label(), user.email);
        }
        RegisterOutcome::VerificationPending { email } => {
            println!(
                "Account created. Check {email} for a verification link, then run `bazaar login`."
            );
        }
    }
    Ok(())
}

pub async fn run_logout(config: ClientConfig) -> Result<(), CliError> {
    let storefront = open_storefront(config).await?;
    if !storefront.session.snapshot().is_authenticated() {
        println!("Not signed in.");
        return Ok(());
    }
    storefront.session.logout().await;
    Ok(())
}

pub async fn run_status(config: ClientConfig, as_json: bool) -> Result<(), CliError> {
    let storefront = open_storefront(config).await?;
    let session = storefront.session.snapshot();

    if as_json {
        let item = status_item(&session, storefront.config.api_base_url.as_deref());
        println!("{}", serde_json::to_string_pretty(&item)?);
        return Ok(());
    }

    println!("{}", format_status_line(&session));
    Ok(())
}
