//! Line formatting for console style output.
//!
//! A record is rendered as
//! `HH:MM:SS.mmm |LVL|                caller.rs:42 > message key=value ...`.
//! The pieces are exposed as plain functions so they can be used and tested
//! without a subscriber, and are combined by [`ConsoleFormat`], a
//! [`FormatEvent`] implementation for `tracing_subscriber::fmt` layers.
use {
    chrono::{Local, Timelike},
    std::{
        ffi::OsStr,
        fmt::{self, Write as _},
        path::{Component, Path, PathBuf},
    },
    tracing::{Event, Level, Subscriber},
    tracing_subscriber::{
        fmt::{
            format::{FormatEvent, FormatFields, Writer},
            time::FormatTime,
            FmtContext,
        },
        registry::LookupSpan,
    },
};

/// Environment variable that disables colored output when set to a non-empty
/// value. See <https://no-color.org>.
pub const NO_COLOR: &str = "NO_COLOR";

/// Width of the right aligned caller column.
pub const CALLER_WIDTH: usize = 26;

/// Canonical level tokens understood by [`format_level`].
pub const LEVEL_TRACE: &str = "trace";
pub const LEVEL_DEBUG: &str = "debug";
pub const LEVEL_INFO: &str = "info";
pub const LEVEL_WARN: &str = "warn";
pub const LEVEL_ERROR: &str = "error";
pub const LEVEL_FATAL: &str = "fatal";
pub const LEVEL_PANIC: &str = "panic";

/// Whether level tags are wrapped in ANSI escape codes.
///
/// The policy is resolved once, when logging is configured, and then handed
/// to the formatters. This keeps the formatters pure: they never consult the
/// environment themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorPolicy {
    /// Emit escape codes.
    #[default]
    Enabled,
    /// Emit plain text.
    Disabled,
}

impl ColorPolicy {
    /// Combine the caller's preference with the value of `NO_COLOR`.
    ///
    /// A non-empty `NO_COLOR` always wins over `disabled == false`.
    pub fn resolve(disabled: bool, no_color: Option<&OsStr>) -> Self {
        let forced_off = no_color.is_some_and(|value| !value.is_empty());
        if disabled || forced_off {
            ColorPolicy::Disabled
        } else {
            ColorPolicy::Enabled
        }
    }

    /// Same as [`ColorPolicy::resolve`], reading `NO_COLOR` from the process
    /// environment.
    pub fn from_env(disabled: bool) -> Self {
        Self::resolve(disabled, std::env::var_os(NO_COLOR).as_deref())
    }

    pub fn is_enabled(self) -> bool {
        self == ColorPolicy::Enabled
    }
}

/// ANSI SGR codes used for level tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    Bold = 1,
    Red = 31,
    Green = 32,
    Yellow = 33,
    Magenta = 35,
}

/// Wrap `text` in `|...|` and, when colors are enabled, in the given escape
/// codes followed by a reset.
fn colorize(text: &str, colors: &[Color], policy: ColorPolicy) -> String {
    if !policy.is_enabled() {
        return format!("|{text}|");
    }
    let mut out = String::with_capacity(text.len() + 16);
    for color in colors {
        out.push_str(&format!("\x1b[{}m", *color as u8));
    }
    out.push_str(&format!("|{text}|\x1b[0m"));
    out
}

/// Map a level token to its three letter tag.
///
/// Known tokens get a fixed abbreviation and color, unknown tokens are cut to
/// their first three characters and upper-cased, and a missing token renders
/// as `???`. The two last cases are only bolded.
///
/// # Examples
/// ```
/// use nlog::{format_level, ColorPolicy};
///
/// assert_eq!(format_level(Some("info"), ColorPolicy::Disabled), "|INF|");
/// assert_eq!(format_level(Some("info"), ColorPolicy::Enabled), "\x1b[32m|INF|\x1b[0m");
/// assert_eq!(format_level(None, ColorPolicy::Disabled), "|???|");
/// ```
pub fn format_level(level: Option<&str>, policy: ColorPolicy) -> String {
    let Some(level) = level else {
        return colorize("???", &[Color::Bold], policy);
    };
    match level {
        LEVEL_TRACE => colorize("TRC", &[Color::Magenta], policy),
        LEVEL_DEBUG => colorize("DBG", &[Color::Yellow], policy),
        LEVEL_INFO => colorize("INF", &[Color::Green], policy),
        LEVEL_WARN => colorize("WRN", &[Color::Red], policy),
        LEVEL_ERROR => colorize("ERR", &[Color::Red, Color::Bold], policy),
        LEVEL_FATAL => colorize("FTL", &[Color::Red, Color::Bold], policy),
        LEVEL_PANIC => colorize("PNC", &[Color::Red, Color::Bold], policy),
        other => {
            let short: String = other.chars().take(3).collect();
            colorize(&short.to_uppercase(), &[Color::Bold], policy)
        }
    }
}

/// Canonical token for a `tracing` level.
pub fn level_token(level: &Level) -> &'static str {
    match *level {
        Level::TRACE => LEVEL_TRACE,
        Level::DEBUG => LEVEL_DEBUG,
        Level::INFO => LEVEL_INFO,
        Level::WARN => LEVEL_WARN,
        Level::ERROR => LEVEL_ERROR,
    }
}

/// Render a caller (`path:line`) as a right aligned column followed by ` >`.
///
/// When `cwd` is given and both paths are absolute, the caller is rewritten
/// relative to it. Otherwise the caller is used as is.
///
/// # Examples
/// ```
/// use std::path::Path;
/// use nlog::format_caller;
///
/// let caller = format_caller("/srv/app/sub/file.rs:10", Some(Path::new("/srv/app")));
/// assert_eq!(caller, format!("{:>26} >", "sub/file.rs:10"));
/// ```
pub fn format_caller(caller: &str, cwd: Option<&Path>) -> String {
    let caller = match cwd {
        Some(cwd) if !caller.is_empty() => relative_to(Path::new(caller), cwd)
            .map(|rel| rel.to_string_lossy().into_owned())
            .unwrap_or_else(|| caller.to_string()),
        _ => caller.to_string(),
    };
    format!("{caller:>width$} >", width = CALLER_WIDTH)
}

/// Lexical relative path from `base` to `path`. `None` when one path is
/// absolute and the other is not.
fn relative_to(path: &Path, base: &Path) -> Option<PathBuf> {
    if path.is_absolute() != base.is_absolute() {
        return None;
    }
    let path: Vec<Component> = path.components().collect();
    let base: Vec<Component> = base.components().collect();
    let common = path.iter().zip(&base).take_while(|(a, b)| a == b).count();

    let mut rel = PathBuf::new();
    for _ in common..base.len() {
        rel.push("..");
    }
    for component in &path[common..] {
        rel.push(component);
    }
    if rel.as_os_str().is_empty() {
        rel.push(".");
    }
    Some(rel)
}

/// `HH:MM:SS` or `HH:MM:SS.mmm`.
pub fn format_timestamp<T: Timelike>(time: &T, millis: bool) -> String {
    if millis {
        format!(
            "{:02}:{:02}:{:02}.{:03}",
            time.hour(),
            time.minute(),
            time.second(),
            (time.nanosecond() / 1_000_000) % 1000
        )
    } else {
        format!("{:02}:{:02}:{:02}", time.hour(), time.minute(), time.second())
    }
}

/// Local wall clock rendered with [`format_timestamp`].
#[derive(Debug, Clone, Copy)]
pub struct LocalClock {
    millis: bool,
}

impl LocalClock {
    pub fn new(millis: bool) -> Self {
        LocalClock { millis }
    }
}

impl Default for LocalClock {
    fn default() -> Self {
        LocalClock::new(true)
    }
}

impl FormatTime for LocalClock {
    fn format_time(&self, w: &mut Writer<'_>) -> fmt::Result {
        w.write_str(&format_timestamp(&Local::now(), self.millis))
    }
}

/// Event formatter producing `timestamp |LVL| caller > message fields`.
#[derive(Debug, Clone)]
pub struct ConsoleFormat {
    timer: LocalClock,
    color: ColorPolicy,
    caller: bool,
    cwd: Option<PathBuf>,
}

impl Default for ConsoleFormat {
    /// Colors on unless `NO_COLOR` is set.
    fn default() -> Self {
        ConsoleFormat::new(ColorPolicy::from_env(false))
    }
}

impl ConsoleFormat {
    /// Formatter with millisecond timestamps and the caller column enabled.
    /// The working directory used to shorten callers is captured here.
    ///
    /// `color` is taken as already resolved; build it with
    /// [`ColorPolicy::from_env`] to honour `NO_COLOR`.
    pub fn new(color: ColorPolicy) -> Self {
        ConsoleFormat {
            timer: LocalClock::default(),
            color,
            caller: true,
            cwd: std::env::current_dir().ok(),
        }
    }

    pub fn with_millis(self, millis: bool) -> Self {
        Self {
            timer: LocalClock::new(millis),
            ..self
        }
    }

    pub fn with_caller(self, caller: bool) -> Self {
        Self { caller, ..self }
    }

    /// Base directory callers are made relative to. `None` leaves callers
    /// untouched.
    pub fn with_cwd(self, cwd: Option<PathBuf>) -> Self {
        Self { cwd, ..self }
    }

    pub fn color(&self) -> ColorPolicy {
        self.color
    }
}

impl<S, N> FormatEvent<S, N> for ConsoleFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(&self, ctx: &FmtContext<'_, S, N>, mut writer: Writer<'_>, event: &Event<'_>) -> fmt::Result {
        let meta = event.metadata();

        self.timer.format_time(&mut writer)?;
        write!(writer, " {}", format_level(Some(level_token(meta.level())), self.color))?;

        if self.caller {
            let caller = match (meta.file(), meta.line()) {
                (Some(file), Some(line)) => format!("{file}:{line}"),
                (Some(file), None) => file.to_string(),
                _ => String::new(),
            };
            write!(writer, " {}", format_caller(&caller, self.cwd.as_deref()))?;
        }

        writer.write_char(' ')?;
        ctx.format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::test_util::CaptureWriter,
        chrono::NaiveTime,
        regex::Regex,
        std::ffi::OsString,
        tracing_subscriber::{fmt, layer::SubscriberExt, Registry},
    };

    #[test]
    fn known_levels_get_fixed_tags_and_colors() {
        let cases = [
            ("trace", "\x1b[35m|TRC|\x1b[0m"),
            ("debug", "\x1b[33m|DBG|\x1b[0m"),
            ("info", "\x1b[32m|INF|\x1b[0m"),
            ("warn", "\x1b[31m|WRN|\x1b[0m"),
            ("error", "\x1b[31m\x1b[1m|ERR|\x1b[0m"),
            ("fatal", "\x1b[31m\x1b[1m|FTL|\x1b[0m"),
            ("panic", "\x1b[31m\x1b[1m|PNC|\x1b[0m"),
        ];
        for (token, expected) in cases {
            assert_eq!(format_level(Some(token), ColorPolicy::Enabled), expected, "level {token}");
        }
    }

    #[test]
    fn unknown_levels_are_cut_and_bolded() {
        assert_eq!(format_level(Some("notice"), ColorPolicy::Enabled), "\x1b[1m|NOT|\x1b[0m");
        assert_eq!(format_level(Some("ok"), ColorPolicy::Enabled), "\x1b[1m|OK|\x1b[0m");
        assert_eq!(format_level(Some("notice"), ColorPolicy::Disabled), "|NOT|");
    }

    #[test]
    fn missing_level_renders_question_marks() {
        assert_eq!(format_level(None, ColorPolicy::Enabled), "\x1b[1m|???|\x1b[0m");
        assert_eq!(format_level(None, ColorPolicy::Disabled), "|???|");
    }

    #[test]
    fn no_color_overrides_caller_preference() {
        let set = OsString::from("1");
        let policy = ColorPolicy::resolve(false, Some(set.as_os_str()));
        assert_eq!(policy, ColorPolicy::Disabled);

        for (token, tag) in [
            ("trace", "TRC"),
            ("debug", "DBG"),
            ("info", "INF"),
            ("warn", "WRN"),
            ("error", "ERR"),
            ("fatal", "FTL"),
            ("panic", "PNC"),
        ] {
            let out = format_level(Some(token), policy);
            assert_eq!(out, format!("|{tag}|"));
            assert!(!out.contains('\x1b'));
        }
    }

    #[test]
    fn empty_no_color_keeps_colors() {
        let empty = OsString::new();
        assert_eq!(ColorPolicy::resolve(false, Some(empty.as_os_str())), ColorPolicy::Enabled);
        assert_eq!(ColorPolicy::resolve(false, None), ColorPolicy::Enabled);
        assert_eq!(ColorPolicy::resolve(true, None), ColorPolicy::Disabled);
    }

    #[test]
    fn caller_is_made_relative_to_cwd() {
        let cwd = std::env::current_dir().unwrap();
        let caller = cwd.join("sub/file.go:10");
        let out = format_caller(&caller.to_string_lossy(), Some(&cwd));
        assert_eq!(out, "            sub/file.go:10 >");
        assert_eq!(out.len(), CALLER_WIDTH + 2);
    }

    #[test]
    fn caller_outside_cwd_walks_up() {
        let out = format_caller("/srv/other/main.rs:3", Some(Path::new("/srv/app")));
        assert_eq!(out, format!("{:>26} >", "../other/main.rs:3"));
    }

    #[test]
    fn relative_or_empty_caller_is_kept() {
        let cwd = Path::new("/srv/app");
        assert_eq!(format_caller("src/lib.rs:7", Some(cwd)), format!("{:>26} >", "src/lib.rs:7"));
        assert_eq!(format_caller("", Some(cwd)), format!("{:>26} >", ""));
        assert_eq!(format_caller("/srv/app/a.rs:1", None), format!("{:>26} >", "/srv/app/a.rs:1"));
    }

    #[test]
    fn long_caller_is_not_truncated() {
        let caller = "src/some/deeply/nested/module/file.rs:1234";
        assert_eq!(format_caller(caller, None), format!("{caller} >"));
    }

    #[test]
    fn timestamp_with_and_without_millis() {
        let time = NaiveTime::from_hms_milli_opt(9, 5, 7, 42).unwrap();
        assert_eq!(format_timestamp(&time, true), "09:05:07.042");
        assert_eq!(format_timestamp(&time, false), "09:05:07");
    }

    #[test]
    fn console_format_renders_full_line() {
        let capture = CaptureWriter::new();
        let layer = fmt::layer()
            .with_ansi(false)
            .event_format(ConsoleFormat::new(ColorPolicy::Disabled))
            .with_writer(capture.clone());
        let subscriber = Registry::default().with(layer);

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(attempt = 3, "hello");
        });

        let line = capture.contents();
        let pattern = Regex::new(r"^\d{2}:\d{2}:\d{2}\.\d{3} \|INF\| +src/format\.rs:\d+ > hello attempt=3\n$").unwrap();
        assert!(pattern.is_match(&line), "unexpected line: {line:?}");
    }

    #[test]
    fn console_format_without_caller_or_millis() {
        let capture = CaptureWriter::new();
        let format = ConsoleFormat::new(ColorPolicy::Disabled)
            .with_caller(false)
            .with_millis(false);
        let layer = fmt::layer()
            .with_ansi(false)
            .event_format(format)
            .with_writer(capture.clone());
        let subscriber = Registry::default().with(layer);

        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!("disk almost full");
        });

        let line = capture.contents();
        let pattern = Regex::new(r"^\d{2}:\d{2}:\d{2} \|WRN\| disk almost full\n$").unwrap();
        assert!(pattern.is_match(&line), "unexpected line: {line:?}");
    }
}
