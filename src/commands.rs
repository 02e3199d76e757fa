//! CLI commands for DroidKit
//!
//! Provides command-line interface functionality for automation and scripting.
//! Each command returns the lines it wants printed so it can be tested
//! without capturing stdout.

use std::sync::Arc;
use anyhow::{Context, Result};
use tracing::info;

use droidkit_core::network::{ChannelObserver, LinkEvent, LinkState, LoggingObserver, NetworkRegistry};
use droidkit_prefs::{FileStore, PrefValue, Preferences, PrefsContext, StoreKind};

/// What to do with a store
#[derive(Debug, Clone, PartialEq)]
pub enum StoreAction {
    /// Print one value
    Get { key: String },
    /// Store a value, typed loosely unless `text` is set
    Set { key: String, value: String, text: bool },
    /// Remove one key
    Remove { key: String },
    /// Print every key and value
    List,
    /// Remove every key
    Clear,
}

/// Store command options
pub struct StoreCommand {
    /// Which accessor to operate on
    pub kind: StoreKind,
    /// Operation to perform
    pub action: StoreAction,
    /// Commit the store after a mutation
    pub autosave: bool,
}

impl StoreCommand {
    /// Execute the store command
    pub async fn execute(&self, ctx: &PrefsContext) -> Result<Vec<String>> {
        let prefs = ctx.accessor(self.kind);
        let mut out = Vec::new();

        let mutated = match &self.action {
            StoreAction::Get { key } => {
                let value = prefs.require(key)?;
                out.push(format!("{} ({})", value, value.type_name()));
                false
            }
            StoreAction::Set { key, value, text } => {
                let value = if *text {
                    PrefValue::Text(value.clone())
                } else {
                    PrefValue::parse_loose(value)
                };
                info!("Setting {}.{} = {}", self.kind.label(), key, value);
                prefs.put(key, value)?;
                true
            }
            StoreAction::Remove { key } => {
                if !prefs.remove(key) {
                    out.push(format!("{} is not set", key));
                }
                true
            }
            StoreAction::List => {
                out.extend(list_lines(prefs));
                false
            }
            StoreAction::Clear => {
                let removed = prefs.clear();
                out.push(format!("Removed {} values", removed));
                true
            }
        };

        if mutated && self.autosave {
            ctx.commit()
                .await
                .with_context(|| format!("failed to save {}", self.kind.label()))?;
        }

        Ok(out)
    }
}

fn list_lines(prefs: &Preferences<FileStore>) -> Vec<String> {
    prefs
        .keys()
        .into_iter()
        .filter_map(|key| {
            prefs
                .get(&key)
                .map(|value| format!("{} = {} ({})", key, value, value.type_name()))
        })
        .collect()
}

/// Parse `interface:state`. An empty interface means no active network.
pub fn parse_link_event(input: &str) -> Result<LinkEvent> {
    let (interface, state) = input
        .rsplit_once(':')
        .with_context(|| format!("expected <interface>:<state>, got '{}'", input))?;
    let state = LinkState::parse(state)?;
    Ok(LinkEvent::new(interface, state))
}

/// Network simulation command options
pub struct NetCommand {
    /// Raw link events in `interface:state` form
    pub events: Vec<String>,
    /// Attach a logging observer to the registry
    pub log_each_round: bool,
}

impl NetCommand {
    /// Feed each event through a network registry and report every round
    pub fn execute(&self) -> Result<Vec<String>> {
        let registry = NetworkRegistry::default();
        let (observer, subscription) = ChannelObserver::new();
        registry.register(observer);
        if self.log_each_round {
            registry.register(Arc::new(LoggingObserver));
        }

        let mut out = Vec::new();
        for input in &self.events {
            let event = parse_link_event(input)?;
            match registry.dispatch(&event) {
                Ok(report) => {
                    for status in subscription.drain() {
                        out.push(format!(
                            "{} -> {} (notified {}, failed {})",
                            input,
                            status,
                            report.notified,
                            report.failed()
                        ));
                    }
                }
                Err(e) => out.push(format!("{} -> {}", input, e.user_message())),
            }
        }

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use droidkit_core::config::PrefsConfig;

    #[test]
    fn test_parse_link_event() {
        let event = parse_link_event("wlan0:connected").unwrap();
        assert_eq!(event, LinkEvent::new("wlan0", LinkState::Connected));

        let event = parse_link_event(":down").unwrap();
        assert_eq!(event.interface, "");
        assert_eq!(event.state, LinkState::Disconnected);

        assert!(parse_link_event("wlan0").is_err());
        assert!(parse_link_event("wlan0:sideways").is_err());
    }

    #[test]
    fn test_net_command_reports_each_round() {
        let cmd = NetCommand {
            events: vec!["wlan0:up".into(), "zz9:up".into(), "rmnet0:connecting".into()],
            log_each_round: false,
        };
        let out = cmd.execute().unwrap();
        assert_eq!(out.len(), 3);
        assert_eq!(out[0], "wlan0:up -> wifi (connected) (notified 1, failed 0)");
        assert_eq!(out[1], "zz9:up -> 'zz9' is not a recognised network interface");
        assert!(out[2].contains("mobile (disconnected)"));
    }

    #[tokio::test]
    async fn test_store_command_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let config = PrefsConfig {
            preferences_file: dir.path().join("preferences.toml"),
            keeper_file: dir.path().join("keeper.json"),
            autosave: true,
        };
        let ctx = PrefsContext::open(&config).await.unwrap();

        let run = |action: StoreAction| StoreCommand {
            kind: StoreKind::Keeper,
            action,
            autosave: true,
        };

        run(StoreAction::Set { key: "retries".into(), value: "3".into(), text: false })
            .execute(&ctx)
            .await
            .unwrap();
        run(StoreAction::Set { key: "pin".into(), value: "0042".into(), text: true })
            .execute(&ctx)
            .await
            .unwrap();

        let out = run(StoreAction::Get { key: "retries".into() }).execute(&ctx).await.unwrap();
        assert_eq!(out, vec!["3 (int)".to_string()]);

        let out = run(StoreAction::List).execute(&ctx).await.unwrap();
        assert_eq!(out, vec!["pin = 0042 (text)".to_string(), "retries = 3 (int)".to_string()]);
        assert!(config.keeper_file.exists());

        assert!(run(StoreAction::Get { key: "missing".into() }).execute(&ctx).await.is_err());
    }
}
