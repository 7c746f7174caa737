//! Scripts run when the period of the day changes.

use std::collections::BTreeMap;
use std::process::{Command, Stdio};

use crate::logger::Log;
use crate::time_state::Period;

/// Commands configured in the `[hooks]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Hooks {
    day: Option<String>,
    night: Option<String>,
    twilight: Option<String>,
}

impl Hooks {
    /// Build from the raw `[hooks]` table. Unknown names are skipped with a
    /// warning.
    pub fn from_section(section: &BTreeMap<String, String>) -> Self {
        let mut hooks = Hooks::default();
        for (name, command) in section {
            let slot = match name.to_ascii_lowercase().as_str() {
                "day" => &mut hooks.day,
                "night" => &mut hooks.night,
                "twilight" => &mut hooks.twilight,
                _ => {
                    Log::log_warning(&format!("Unknown hook `{}'.", name));
                    continue;
                }
            };
            *slot = Some(command.clone());
        }
        hooks
    }

    pub fn command_for(&self, period: Period) -> Option<&str> {
        match period {
            Period::Day => self.day.as_deref(),
            Period::Night => self.night.as_deref(),
            Period::Twilight => self.twilight.as_deref(),
        }
    }

    /// Start the hook for `period` without waiting for it.
    ///
    /// The period name is passed as the first positional argument.
    pub fn run(&self, period: Period) {
        let Some(command) = self.command_for(period) else {
            return;
        };

        Log::log_debug(&format!("Running {} hook: {}", period.as_str(), command));
        let spawned = Command::new("sh")
            .arg("-c")
            .arg(command)
            .arg("sunshift")
            .arg(period.as_str())
            .stdin(Stdio::null())
            .spawn();

        match spawned {
            // Reap in the background so finished hooks do not linger as zombies
            Ok(mut child) => {
                std::thread::spawn(move || {
                    let _ = child.wait();
                });
            }
            Err(e) => {
                Log::log_warning(&format!("Failed to run {} hook: {}", period.as_str(), e));
            }
        }
    }
}
