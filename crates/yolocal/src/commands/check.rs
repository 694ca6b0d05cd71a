//! Credential check against the hub token endpoint.

use yolocal_api::TransportConfig;
use yolocal_core::CoreError;

use crate::cli::GlobalOpts;
use crate::config;
use crate::error::CliError;
use crate::output;

pub async fn handle(global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = config::load_config()?;
    let (profile, hub) = config::hub_config(global, &cfg)?;
    let base_url = hub.base_url()?;

    let transport = TransportConfig {
        timeout: hub.timeout,
        ..TransportConfig::default()
    };
    yolocal_api::verify_credentials(&base_url, &hub.client_id, hub.client_secret, &transport)
        .await
        .map_err(|e| CliError::from(CoreError::from(e)).with_profile(&profile))?;

    output::print_output(
        &format!("Credentials OK for profile '{profile}' ({base_url})"),
        global.quiet,
    );
    Ok(())
}
