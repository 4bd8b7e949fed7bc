//! Configuration file discovery and path resolution.

use std::path::{Path, PathBuf};

use posixdir_core::config::ConfigLayer;
use posixdir_core::{Error, ProvisionConfig, Result};
use tracing::debug;

/// File name of the per-user configuration under `~/.config`.
pub const USER_CONFIG_FILE: &str = "posixdir.yaml";

/// Default per-user configuration path, if a home directory is known.
pub fn user_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".config").join(USER_CONFIG_FILE))
}

/// Loads the user configuration (if present) overlaid with `explicit` (if given).
pub fn load(explicit: Option<&Path>) -> Result<ProvisionConfig> {
    load_layers(user_config_path().as_deref(), explicit)
}

/// Key whose relative value is resolved against the directory of the file that set it.
const CA_CERT_KEY: &str = "ldap_ca_cert_file";

/// Merges the optional user file and the optional explicit file, in that order.
///
/// A missing user file is skipped; a missing explicit file is an error. A relative
/// `ldap_ca_cert_file` is resolved against the directory of the file that set it.
pub fn load_layers(
    user_config: Option<&Path>,
    explicit: Option<&Path>,
) -> Result<ProvisionConfig> {
    let mut layers = Vec::new();
    let mut anchor = None;

    if let Some(path) = user_config.filter(|path| path.is_file()) {
        let layer = ConfigLayer::from_file(path)?;
        if layer.defines(CA_CERT_KEY) {
            anchor = path.parent().map(Path::to_path_buf);
        }
        layers.push(layer);
    }

    if let Some(path) = explicit {
        let path = expand_home(path);
        if !path.is_file() {
            return Err(Error::Config(format!(
                "configuration file {} does not exist",
                path.display()
            )));
        }
        let layer = ConfigLayer::from_file(&path)?;
        if layer.defines(CA_CERT_KEY) {
            anchor = path.parent().map(Path::to_path_buf);
        }
        layers.push(layer);
    }

    if layers.is_empty() {
        let looked_at = user_config.map_or_else(
            || format!("~/.config/{USER_CONFIG_FILE}"),
            |path| path.display().to_string(),
        );
        return Err(Error::Config(format!(
            "no configuration found; create {looked_at} or pass --config"
        )));
    }

    let mut config = ProvisionConfig::from_layers(&layers)?;
    if let Some(ca) = config.ldap_ca_cert_file.take() {
        let resolved = resolve_path(&ca, anchor.as_deref());
        debug!(path = %resolved.display(), "resolved CA certificate path");
        config.ldap_ca_cert_file = Some(resolved);
    }
    Ok(config)
}

/// Expands a leading `~` and anchors relative paths at `base`.
pub fn resolve_path(path: &Path, base: Option<&Path>) -> PathBuf {
    let expanded = expand_home(path);
    match base {
        Some(base) if expanded.is_relative() => base.join(expanded),
        _ => expanded,
    }
}

fn expand_home(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match dirs::home_dir() {
        Some(home) => home.join(rest),
        None => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const BASE: &str = "\
ldap_uri: ldap://ldap.example.com
ldap_bind_dn: cn=admin,dc=example,dc=com
ldap_bind_pw: secret
ldap_root_dn: dc=example,dc=com
";

    #[test]
    fn explicit_file_overrides_user_file() {
        let dir = tempfile::tempdir().unwrap();
        let user = dir.path().join("user.yaml");
        fs::write(&user, BASE).unwrap();
        let explicit_dir = dir.path().join("site");
        fs::create_dir(&explicit_dir).unwrap();
        let explicit = explicit_dir.join("site.yaml");
        fs::write(
            &explicit,
            "ldap_uri: ldaps://ldap.site.example\nldap_ca_cert_file: certs/ca.pem\n",
        )
        .unwrap();

        let config = load_layers(Some(&user), Some(&explicit)).unwrap();
        assert_eq!(config.ldap_uri, "ldaps://ldap.site.example");
        assert_eq!(config.ldap_bind_dn, "cn=admin,dc=example,dc=com");
        assert_eq!(
            config.ldap_ca_cert_file.as_deref(),
            Some(explicit_dir.join("certs/ca.pem").as_path())
        );
    }

    #[test]
    fn ca_path_is_anchored_at_the_file_that_set_it() {
        let dir = tempfile::tempdir().unwrap();
        let user_dir = dir.path().join("home");
        fs::create_dir(&user_dir).unwrap();
        let user = user_dir.join("posixdir.yaml");
        fs::write(&user, format!("{BASE}ldap_ca_cert_file: ca.pem\n")).unwrap();
        let explicit_dir = dir.path().join("site");
        fs::create_dir(&explicit_dir).unwrap();
        let explicit = explicit_dir.join("site.yaml");
        fs::write(&explicit, "ldap_uri: ldaps://ldap.site.example\n").unwrap();

        let config = load_layers(Some(&user), Some(&explicit)).unwrap();
        assert_eq!(config.ldap_uri, "ldaps://ldap.site.example");
        assert_eq!(
            config.ldap_ca_cert_file.as_deref(),
            Some(user_dir.join("ca.pem").as_path())
        );
    }

    #[test]
    fn missing_user_file_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let explicit = dir.path().join("site.yaml");
        fs::write(&explicit, BASE).unwrap();

        let absent = dir.path().join("absent.yaml");
        let config = load_layers(Some(&absent), Some(&explicit)).unwrap();
        assert_eq!(config.root_dns().unwrap(), "example.com");
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_layers(None, Some(&dir.path().join("absent.yaml")));
        assert!(matches!(
            result,
            Err(Error::Config(message)) if message.contains("does not exist")
        ));
    }

    #[test]
    fn no_configuration_at_all_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_layers(Some(&dir.path().join("absent.yaml")), None);
        assert!(matches!(result, Err(Error::Config(message)) if message.contains("--config")));
    }

    #[test]
    fn absolute_paths_are_kept() {
        let resolved = resolve_path(Path::new("/etc/ssl/ca.pem"), Some(Path::new("/home/a")));
        assert_eq!(resolved, PathBuf::from("/etc/ssl/ca.pem"));
        let relative = resolve_path(Path::new("ca.pem"), Some(Path::new("/home/a/.config")));
        assert_eq!(relative, PathBuf::from("/home/a/.config/ca.pem"));
    }

    #[test]
    fn tilde_expands_to_home() {
        if let Some(home) = dirs::home_dir() {
            let resolved = resolve_path(Path::new("~/ca.pem"), Some(Path::new("/elsewhere")));
            assert_eq!(resolved, home.join("ca.pem"));
        }
    }
}
