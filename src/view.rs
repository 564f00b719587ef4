//! View model builder: flat, sorted, striped rows for the detail table.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::config::Settings;
use crate::history::{host_event_key, service_event_key, EventHistory};
use crate::model::{sortable_seconds, FilteredView, HostMap, ItemFlags, Status};

pub const COL_HOST: usize = 0;
pub const COL_HOST_FLAGS: usize = 1;
pub const COL_SERVICE: usize = 2;
pub const COL_SERVICE_FLAGS: usize = 3;
pub const COL_STATUS: usize = 4;
pub const COL_LAST_CHECK: usize = 5;
pub const COL_DURATION: usize = 6;
pub const COL_ATTEMPT: usize = 7;
pub const COL_STATUS_INFORMATION: usize = 8;
pub const COL_DUMMY: usize = 9;
pub const COL_FG_BRUSH: usize = 10;
pub const COL_BG_BRUSH: usize = 11;
pub const COL_FG_COLOR_KEY: usize = 12;
pub const COL_BG_COLOR_KEY: usize = 13;
pub const COL_ICONS: usize = 14;

/// Number of visible text columns, dummy included.
pub const TEXT_COLUMNS: usize = 10;

/// An RGB color as used for row brushes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse `#RRGGBB`. Anything else yields None.
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.trim().strip_prefix('#')?;
        if hex.len() != 6 || !hex.is_ascii() {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
        Some(Self::rgb(channel(0)?, channel(2)?, channel(4)?))
    }

    pub fn to_hex(&self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }

    /// HSL lightness on a 0-255 scale.
    pub fn lightness(&self) -> u8 {
        let max = self.r.max(self.g).max(self.b) as u16;
        let min = self.r.min(self.g).min(self.b) as u16;
        ((max + min) / 2) as u8
    }

    /// Divide the HSV value by `factor / 100`.
    pub fn darker(&self, factor: u32) -> Self {
        if factor == 0 {
            return *self;
        }
        let scale = |c: u8| ((c as u32 * 100) / factor).min(255) as u8;
        Self::rgb(scale(self.r), scale(self.g), scale(self.b))
    }

    /// Multiply the HSV value by `factor / 100`. Values past the top of the
    /// scale are traded for lower saturation.
    pub fn lighter(&self, factor: u32) -> Self {
        let (h, s, v) = self.to_hsv();
        let mut v = v * factor as f64 / 100.0;
        let mut s = s;
        if v > 255.0 {
            s = (s - (v - 255.0)).max(0.0);
            v = 255.0;
        }
        Self::from_hsv(h, s, v.floor())
    }

    fn to_hsv(self) -> (f64, f64, f64) {
        let (r, g, b) = (self.r as f64, self.g as f64, self.b as f64);
        let max = r.max(g).max(b);
        let min = r.min(g).min(b);
        let delta = max - min;
        let s = if max == 0.0 { 0.0 } else { delta / max * 255.0 };
        let h = if delta == 0.0 {
            0.0
        } else if max == r {
            60.0 * (((g - b) / delta).rem_euclid(6.0))
        } else if max == g {
            60.0 * ((b - r) / delta + 2.0)
        } else {
            60.0 * ((r - g) / delta + 4.0)
        };
        (h, s, max)
    }

    fn from_hsv(h: f64, s: f64, v: f64) -> Self {
        let s = s / 255.0;
        let c = v * s;
        let x = c * (1.0 - ((h / 60.0).rem_euclid(2.0) - 1.0).abs());
        let m = v - c;
        let (r, g, b) = match (h / 60.0) as u32 {
            0 => (c, x, 0.0),
            1 => (x, c, 0.0),
            2 => (0.0, c, x),
            3 => (0.0, x, c),
            4 => (x, 0.0, c),
            _ => (c, 0.0, x),
        };
        let channel = |f: f64| (f + m).round().clamp(0.0, 255.0) as u8;
        Self::rgb(channel(r), channel(g), channel(b))
    }
}

/// Two alternation levels of brushes per color key.
#[derive(Debug, Clone, Default)]
pub struct Palette {
    levels: [BTreeMap<String, Color>; 2],
}

impl Palette {
    pub fn from_settings(settings: &Settings) -> Self {
        let intensity = if settings.grid_use_custom_intensity {
            100 + settings.grid_alternation_intensity
        } else {
            115
        };

        let mut palette = Palette::default();
        let states = std::iter::once(Status::Ok).chain(Status::PROBLEMS);
        for status in states {
            for role in ["text", "background"] {
                let key = format!("{}{}", status.color_key(), role);
                let base = Color::from_hex(settings.color(&key)).unwrap_or_else(|| {
                    tracing::warn!("Invalid color for {}, using black", key);
                    Color::rgb(0, 0, 0)
                });

                let alternate = if role == "background" && settings.show_grid {
                    if base.lightness() < 30 {
                        Color::rgb(
                            base.r.saturating_add(30),
                            base.g.saturating_add(30),
                            base.b.saturating_add(30),
                        )
                        .lighter(intensity)
                    } else {
                        base.darker(intensity)
                    }
                } else {
                    base
                };

                palette.levels[0].insert(key.clone(), base);
                palette.levels[1].insert(key, alternate);
            }
        }
        palette
    }

    pub fn brush(&self, level: usize, key: &str) -> Color {
        self.levels[level % 2]
            .get(key)
            .copied()
            .unwrap_or(Color::rgb(0, 0, 0))
    }
}

/// One table row. Field order mirrors the contractual column indices.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub host: String,
    pub host_flags: String,
    pub service: String,
    pub service_flags: String,
    pub status: Status,
    pub last_check: String,
    pub duration: String,
    pub attempt: String,
    pub status_information: String,
    pub dummy: String,
    pub fg_brush: Color,
    pub bg_brush: Color,
    pub fg_color_key: String,
    pub bg_color_key: String,
    pub icons: ItemFlags,
}

impl Row {
    /// Text of a column, `None` for the brush and icon columns.
    pub fn text(&self, column: usize) -> Option<&str> {
        Some(match column {
            COL_HOST => &self.host,
            COL_HOST_FLAGS => &self.host_flags,
            COL_SERVICE => &self.service,
            COL_SERVICE_FLAGS => &self.service_flags,
            COL_STATUS => self.status.as_str(),
            COL_LAST_CHECK => &self.last_check,
            COL_DURATION => &self.duration,
            COL_ATTEMPT => &self.attempt,
            COL_STATUS_INFORMATION => &self.status_information,
            COL_DUMMY => &self.dummy,
            COL_FG_COLOR_KEY => &self.fg_color_key,
            COL_BG_COLOR_KEY => &self.bg_color_key,
            _ => return None,
        })
    }

    fn restripe(&mut self, index: usize, palette: &Palette) {
        self.fg_brush = palette.brush(index, &self.fg_color_key);
        self.bg_brush = palette.brush(index, &self.bg_color_key);
    }
}

/// Which flag columns carry anything at all.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ViewInfo {
    pub hosts_flags_column_needed: bool,
    pub services_flags_column_needed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// Sort column memory. The previously clicked column becomes the tiebreak
/// for the next one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortState {
    pub column: usize,
    pub order: SortOrder,
    last_column_cached: usize,
    last_column_real: usize,
    last_order: SortOrder,
}

impl Default for SortState {
    fn default() -> Self {
        Self::new(COL_STATUS, SortOrder::Descending)
    }
}

impl SortState {
    pub fn new(column: usize, order: SortOrder) -> Self {
        Self {
            column,
            order,
            last_column_cached: column,
            last_column_real: COL_HOST,
            last_order: SortOrder::Ascending,
        }
    }

    /// Record a header click on `column`.
    pub fn click(&mut self, column: usize, order: SortOrder) {
        if self.last_column_cached != column {
            self.last_column_real = self.last_column_cached;
            self.last_order = self.order;
        }
        self.column = column;
        self.order = order;
        self.last_column_cached = column;
    }

    pub fn tiebreak_column(&self) -> usize {
        self.last_column_real
    }
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum SortKey {
    Text(String),
    Rank(Status),
    Seconds(i64),
}

fn sort_key(row: &Row, column: usize) -> SortKey {
    match column {
        COL_HOST | COL_HOST_FLAGS => SortKey::Text(row.host.to_lowercase()),
        COL_SERVICE | COL_SERVICE_FLAGS => SortKey::Text(row.service.to_lowercase()),
        COL_STATUS => SortKey::Rank(row.status),
        COL_LAST_CHECK => SortKey::Seconds(sortable_seconds(&row.last_check)),
        COL_DURATION => SortKey::Seconds(sortable_seconds(&row.duration)),
        COL_ATTEMPT => SortKey::Text(row.attempt.clone()),
        _ => SortKey::Text(row.status_information.to_lowercase()),
    }
}

fn stable_sort(rows: &mut [Row], column: usize, order: SortOrder) {
    rows.sort_by(|a, b| {
        let ord: Ordering = sort_key(a, column).cmp(&sort_key(b, column));
        match order {
            SortOrder::Ascending => ord,
            SortOrder::Descending => ord.reverse(),
        }
    });
}

/// Sort in two passes and re-stripe from the cached color keys.
pub fn sort_rows(rows: &mut [Row], sort: &SortState, palette: &Palette) {
    stable_sort(rows, sort.last_column_real, sort.last_order);
    stable_sort(rows, sort.column, sort.order);
    for (index, row) in rows.iter_mut().enumerate() {
        row.restripe(index, palette);
    }
}

/// Flatten a filtered view into sorted, striped rows.
pub fn build_rows(
    server: &str,
    view: &FilteredView,
    hosts: &HostMap,
    history: &EventHistory,
    palette: &Palette,
    sort: &SortState,
) -> (Vec<Row>, ViewInfo) {
    let mut rows = Vec::with_capacity(view.len());

    for host in view.hosts_in_order() {
        let mut host_flags = host.flags.letters();
        if history.is_fresh(&host_event_key(server, host)) {
            host_flags.push('N');
        }
        rows.push(new_row(
            host.status,
            RowText {
                host: &host.name,
                host_flags,
                service: "",
                service_flags: String::new(),
                last_check: &host.last_check,
                duration: &host.duration,
                attempt: &host.attempt,
                status_information: &host.status_information,
            },
            host.flags.clone(),
        ));
    }

    for service in view.services_in_order() {
        let host_flags = hosts
            .get(&service.host)
            .map(|h| h.flags.letters())
            .unwrap_or_default();
        let mut service_flags = service.flags.letters();
        if history.is_fresh(&service_event_key(server, service)) {
            service_flags.push('N');
        }
        rows.push(new_row(
            service.status,
            RowText {
                host: &service.host,
                host_flags,
                service: &service.name,
                service_flags,
                last_check: &service.last_check,
                duration: &service.duration,
                attempt: &service.attempt,
                status_information: &service.status_information,
            },
            service.flags.clone(),
        ));
    }

    let info = ViewInfo {
        hosts_flags_column_needed: rows.iter().any(|r| !r.host_flags.is_empty()),
        services_flags_column_needed: rows.iter().any(|r| !r.service_flags.is_empty()),
    };

    sort_rows(&mut rows, sort, palette);
    (rows, info)
}

struct RowText<'a> {
    host: &'a str,
    host_flags: String,
    service: &'a str,
    service_flags: String,
    last_check: &'a str,
    duration: &'a str,
    attempt: &'a str,
    status_information: &'a str,
}

fn new_row(status: Status, text: RowText<'_>, icons: ItemFlags) -> Row {
    let color_key = status.color_key();
    Row {
        host: text.host.to_string(),
        host_flags: text.host_flags,
        service: text.service.to_string(),
        service_flags: text.service_flags,
        status,
        last_check: text.last_check.to_string(),
        duration: text.duration.to_string(),
        attempt: text.attempt.to_string(),
        status_information: text.status_information.replace('\n', " "),
        dummy: String::new(),
        // striped by sort_rows
        fg_brush: Color::rgb(0, 0, 0),
        bg_brush: Color::rgb(0, 0, 0),
        fg_color_key: format!("{}text", color_key),
        bg_color_key: format!("{}background", color_key),
        icons,
    }
}

/// The dummy column only shows on tables narrower than the widest one, so
/// the widest stretches and the others pad.
pub fn dummy_column_visible(table_width: u32, widest_table_width: u32) -> bool {
    table_width < widest_table_width
}
