use autologin_core_types::{SessionPayload, SiteProfile};
use tracing::info;

use crate::errors::EngineError;

/// Address that opens `profile` with its session armed.
pub fn launch_address(profile: &SiteProfile) -> Result<String, EngineError> {
    if !profile.enabled {
        return Err(EngineError::ProfileDisabled(profile.name.clone()));
    }
    profile.validate()?;
    let payload = SessionPayload::from(profile);
    let address = autologin_transport::launch_address(&profile.address, &payload)?;
    info!(profile = %profile.name, flow = %profile.flow, "launch address prepared");
    Ok(address)
}

#[cfg(test)]
mod tests {
    use super::*;
    use autologin_core_types::{FieldKind, FlowKind, ProfileError};

    #[test]
    fn launch_address_carries_profile_session() {
        let profile = SiteProfile::new("Intranet", "https://intra.example.com/Login.aspx", "jo", "s3cr&t")
            .with_flow(FlowKind::MultiPage)
            .with_selector(FieldKind::Submit, "#btnEntrar");
        let address = launch_address(&profile).unwrap();
        assert!(address.starts_with("https://intra.example.com/Login.aspx#"));

        let decoded = autologin_transport::decode_address(&address).unwrap();
        assert_eq!(decoded, SessionPayload::from(&profile));
        assert_eq!(decoded.overrides.submit.as_deref(), Some("#btnEntrar"));
    }

    #[test]
    fn disabled_and_invalid_profiles_are_refused() {
        let mut disabled = SiteProfile::new("Off", "https://example.com", "a", "b");
        disabled.enabled = false;
        assert!(matches!(
            launch_address(&disabled),
            Err(EngineError::ProfileDisabled(_))
        ));

        let relative = SiteProfile::new("Rel", "/login", "a", "b");
        assert!(matches!(
            launch_address(&relative),
            Err(EngineError::Profile(ProfileError::InvalidAddress { .. }))
        ));

        let no_secret = SiteProfile::new("Empty", "https://example.com", "a", "");
        assert!(matches!(
            launch_address(&no_secret),
            Err(EngineError::Profile(ProfileError::MissingSecret(_)))
        ));
    }
}
