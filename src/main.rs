use lofi_radio::config::{self, Settings};
use lofi_radio::i18n::Locale;
use tracing::info;

#[derive(Debug, Default, PartialEq)]
struct CliArgs {
    playlist: Option<String>,
    category: Option<String>,
    locale: Option<Locale>,
    no_cache: bool,
    autoplay: bool,
}

impl CliArgs {
    fn apply(self, settings: &mut Settings) {
        if let Some(playlist) = self.playlist {
            settings.playlist = playlist;
        }
        if self.category.is_some() {
            settings.category = self.category;
        }
        if self.locale.is_some() {
            settings.locale = self.locale;
        }
        if self.no_cache {
            settings.offline_cache = false;
        }
        if self.autoplay {
            settings.autoplay = true;
        }
    }
}

fn main() -> anyhow::Result<()> {
    let args = parse_args(std::env::args().skip(1).collect())?;

    config::ensure_config_dir()?;
    let _log_guard = lofi_radio::logging::init(&config::logs_dir()?)?;

    let mut settings = config::load_settings()?;
    args.apply(&mut settings);
    info!(
        playlist = %settings.playlist,
        category = settings.category.as_deref().unwrap_or("-"),
        locale = ?settings.resolved_locale(),
        offline_cache = settings.offline_cache,
        "starting lofi radio"
    );

    lofi_radio::app::run(settings)
}

fn parse_args(args: Vec<String>) -> anyhow::Result<CliArgs> {
    let mut out = CliArgs::default();
    let mut index = 0;
    while index < args.len() {
        match args[index].as_str() {
            "--playlist" => out.playlist = Some(required_value(&args, &mut index, "--playlist")?),
            "--category" => out.category = Some(required_value(&args, &mut index, "--category")?),
            "--locale" => {
                let value = required_value(&args, &mut index, "--locale")?;
                let Some(locale) = Locale::parse(&value) else {
                    anyhow::bail!("--locale must be ru or en, got {value}");
                };
                out.locale = Some(locale);
            }
            "--no-cache" => out.no_cache = true,
            "--autoplay" => out.autoplay = true,
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            other => anyhow::bail!("unknown argument {other}"),
        }
        index += 1;
    }
    Ok(out)
}

fn required_value(args: &[String], index: &mut usize, flag: &str) -> anyhow::Result<String> {
    *index += 1;
    let Some(value) = args.get(*index) else {
        anyhow::bail!("{flag} requires a value");
    };
    if value.trim().is_empty() {
        anyhow::bail!("{flag} cannot be empty");
    }
    Ok(value.trim().to_string())
}

fn print_help() {
    println!("lofi - terminal lofi radio");
    println!("  --playlist <path|url>  Playlist document (default playlist.json)");
    println!("  --category <name>      Only play tracks of this category, e.g. xmas");
    println!("  --locale <ru|en>       Interface language");
    println!("  --no-cache             Do not use the offline cache");
    println!("  --autoplay             Start playing without waiting for space");
}
