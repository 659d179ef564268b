use crate::i18n::Strings;
use anyhow::{Context, Result};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::info;

pub const REVEAL_DELAY: Duration = Duration::from_secs(2);
pub const DESKTOP_FILE_NAME: &str = "lofi-radio.desktop";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Ios,
    Android,
    MacOs,
    Windows,
    Linux,
    Other,
}

impl Platform {
    /// Best-effort guess from a user-agent string.
    pub fn sniff(user_agent: &str) -> Self {
        let contains = |needle: &str| user_agent.contains(needle);
        if ["iPad", "iPhone", "iPod"].into_iter().any(contains) {
            Self::Ios
        } else if contains("Android") {
            Self::Android
        } else if contains("Macintosh") || contains("Mac OS X") {
            Self::MacOs
        } else if contains("Windows") {
            Self::Windows
        } else if contains("Linux") || contains("X11") {
            Self::Linux
        } else {
            Self::Other
        }
    }

    pub fn instructions(self, strings: &Strings) -> &'static str {
        match self {
            Self::Ios => strings.install_ios,
            Self::Android => strings.install_android,
            Self::MacOs => strings.install_macos,
            Self::Windows => strings.install_windows,
            Self::Linux => strings.install_linux,
            Self::Other => strings.install_other,
        }
    }
}

/// User-agent style description of the host: OS plus the terminal program.
pub fn user_agent() -> String {
    let os = match env::consts::OS {
        "linux" => "X11; Linux",
        "macos" => "Macintosh; Mac OS X",
        "windows" => "Windows NT",
        "android" => "Linux; Android",
        "ios" => "iPhone; iOS",
        other => other,
    };
    let terminal = env::var("TERM_PROGRAM").unwrap_or_else(|_| String::from("terminal"));
    format!(
        "lofi-radio/{} ({os}) {terminal}",
        env!("CARGO_PKG_VERSION")
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptChoice {
    Accepted,
    Dismissed,
}

/// A platform install dialog that was held back until the user asks for it.
pub trait DeferredPrompt {
    fn prompt(&mut self) -> Result<PromptChoice>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickOutcome {
    Prompted(PromptChoice),
    PromptFailed(String),
    Instructions(Platform),
}

pub struct InstallPrompter {
    platform: Platform,
    installed: bool,
    deferred: Option<Box<dyn DeferredPrompt>>,
    available_since: Option<Instant>,
}

impl InstallPrompter {
    pub fn new(platform: Platform, installed: bool) -> Self {
        Self {
            platform,
            installed,
            deferred: None,
            available_since: None,
        }
    }

    pub fn is_installed(&self) -> bool {
        self.installed
    }

    pub fn on_install_available(&mut self, prompt: Box<dyn DeferredPrompt>, now: Instant) {
        if self.installed {
            return;
        }
        self.deferred = Some(prompt);
        self.available_since = Some(now);
    }

    pub fn on_installed(&mut self) {
        info!("app installed");
        self.installed = true;
        self.deferred = None;
        self.available_since = None;
    }

    pub fn button_visible(&self, now: Instant) -> bool {
        !self.installed
            && self.deferred.is_some()
            && self
                .available_since
                .is_some_and(|since| now.saturating_duration_since(since) >= REVEAL_DELAY)
    }

    pub fn click(&mut self, now: Instant) -> ClickOutcome {
        if !self.button_visible(now) {
            return ClickOutcome::Instructions(self.platform);
        }
        let Some(mut prompt) = self.deferred.take() else {
            return ClickOutcome::Instructions(self.platform);
        };
        self.available_since = None;

        match prompt.prompt() {
            Ok(choice) => {
                info!(?choice, "install prompt answered");
                if choice == PromptChoice::Accepted {
                    self.on_installed();
                }
                ClickOutcome::Prompted(choice)
            }
            Err(err) => ClickOutcome::PromptFailed(format!("{err:#}")),
        }
    }
}

pub fn desktop_entry_path() -> Option<PathBuf> {
    let data_home = env::var_os("XDG_DATA_HOME")
        .map(PathBuf::from)
        .filter(|path| path.is_absolute())
        .or_else(|| env::var_os("HOME").map(|home| PathBuf::from(home).join(".local/share")))?;
    Some(data_home.join("applications").join(DESKTOP_FILE_NAME))
}

/// Installs a freedesktop launcher for the running binary.
pub struct DesktopEntryPrompt {
    path: PathBuf,
    exec: PathBuf,
}

impl DesktopEntryPrompt {
    pub fn new(path: PathBuf, exec: PathBuf) -> Self {
        Self { path, exec }
    }

    pub fn is_installed(path: &Path) -> bool {
        path.is_file()
    }

    fn contents(&self) -> String {
        format!(
            "[Desktop Entry]\nType=Application\nName=Lofi Radio\nComment=Lofi music radio\nExec={}\nTerminal=true\nCategories=AudioVideo;Audio;Player;\n",
            self.exec.display()
        )
    }
}

impl DeferredPrompt for DesktopEntryPrompt {
    fn prompt(&mut self) -> Result<PromptChoice> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        fs::write(&self.path, self.contents())
            .with_context(|| format!("failed to write {}", self.path.display()))?;
        info!(path = %self.path.display(), "desktop launcher written");
        Ok(PromptChoice::Accepted)
    }
}
