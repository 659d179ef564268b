use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    Ru,
    En,
}

impl Locale {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "ru" => Some(Self::Ru),
            "en" => Some(Self::En),
            _ => None,
        }
    }

    pub fn from_env() -> Self {
        for key in ["LC_ALL", "LC_MESSAGES", "LANG"] {
            if let Ok(value) = env::var(key)
                && !value.is_empty()
            {
                return Self::from_lang_tag(&value);
            }
        }
        Self::default()
    }

    pub fn from_lang_tag(tag: &str) -> Self {
        let lower = tag.to_ascii_lowercase();
        if lower.starts_with("ru") {
            Self::Ru
        } else if lower.starts_with("en") || lower == "c" || lower.starts_with("c.") {
            Self::En
        } else {
            Self::default()
        }
    }

    pub fn strings(self) -> &'static Strings {
        match self {
            Self::Ru => &RU,
            Self::En => &EN,
        }
    }
}

pub struct Strings {
    pub app_title: &'static str,
    pub click_to_start: &'static str,
    pub loading: &'static str,
    pub playing: &'static str,
    pub pause: &'static str,
    pub track_counter: &'static str,
    pub playlist_empty: &'static str,
    pub playlist_error: &'static str,
    pub playback_error: &'static str,
    pub track_load_error: &'static str,
    pub end_of_playlist: &'static str,
    pub liked: &'static str,
    pub unliked: &'static str,
    pub likes_save_error: &'static str,
    pub volume: &'static str,
    pub install_button: &'static str,
    pub install_title: &'static str,
    pub install_done: &'static str,
    pub install_dismissed: &'static str,
    pub install_error: &'static str,
    pub close_hint: &'static str,
    pub install_ios: &'static str,
    pub install_android: &'static str,
    pub install_macos: &'static str,
    pub install_windows: &'static str,
    pub install_linux: &'static str,
    pub install_other: &'static str,
    pub key_help: &'static str,
}

static RU: Strings = Strings {
    app_title: "Lofi Radio",
    click_to_start: "Нажмите пробел для начала",
    loading: "Загрузка...",
    playing: "Играет",
    pause: "Пауза",
    track_counter: "трек",
    playlist_empty: "Плейлист пуст. Добавьте треки в playlist.json",
    playlist_error: "Ошибка загрузки плейлиста",
    playback_error: "Ошибка воспроизведения",
    track_load_error: "Ошибка загрузки трека",
    end_of_playlist: "Плейлист закончился",
    liked: "Добавлено в избранное",
    unliked: "Удалено из избранного",
    likes_save_error: "Ошибка сохранения лайков",
    volume: "Громкость",
    install_button: "[i] Установить приложение",
    install_title: "Установка приложения",
    install_done: "Установлено!",
    install_dismissed: "Установка отменена",
    install_error: "Не удалось установить",
    close_hint: "Esc - понятно",
    install_ios: "Нажмите «Поделиться», выберите «На экран Домой» и нажмите «Добавить».",
    install_android: "Откройте меню (три точки) и выберите «Установить приложение» или «Добавить на главный экран».",
    install_macos: "Перетащите программу lofi в /Applications или добавьте alias в ~/.zshrc.",
    install_windows: "Закрепите lofi.exe на начальном экране или на панели задач.",
    install_linux: "Добавьте lofi в $PATH или создайте ярлык в ~/.local/share/applications.",
    install_other: "Добавьте lofi в $PATH или создайте ярлык в меню приложений.",
    key_help: "пробел: play/pause  n/p: трек  l: лайк  +/-: громкость  [/]: перемотка  i: установить  q: выход",
};

static EN: Strings = Strings {
    app_title: "Lofi Radio",
    click_to_start: "Press space to start",
    loading: "Loading...",
    playing: "Playing",
    pause: "Pause",
    track_counter: "track",
    playlist_empty: "Playlist is empty. Add tracks to playlist.json",
    playlist_error: "Failed to load playlist",
    playback_error: "Playback error",
    track_load_error: "Failed to load track",
    end_of_playlist: "Playlist finished",
    liked: "Added to favorites",
    unliked: "Removed from favorites",
    likes_save_error: "Failed to save likes",
    volume: "Volume",
    install_button: "[i] Install app",
    install_title: "Install app",
    install_done: "Installed!",
    install_dismissed: "Install cancelled",
    install_error: "Install failed",
    close_hint: "Esc - got it",
    install_ios: "Tap Share, choose \"Add to Home Screen\" and confirm with \"Add\".",
    install_android: "Open the menu (three dots) and pick \"Install app\" or \"Add to Home screen\".",
    install_macos: "Drag the lofi binary into /Applications or add an alias to ~/.zshrc.",
    install_windows: "Pin lofi.exe to Start or to the taskbar.",
    install_linux: "Put lofi on your $PATH or create a launcher in ~/.local/share/applications.",
    install_other: "Put lofi on your $PATH or add a launcher to your application menu.",
    key_help: "space: play/pause  n/p: track  l: like  +/-: volume  [/]: seek  i: install  q: quit",
};
