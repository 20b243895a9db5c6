use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::sql::{quote, sanitize_allow_dots};

/// Ordering and paging for a select, as sent by callers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_by: Option<OrderBy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<NumberOrString>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<NumberOrString>,
    /// Order case-insensitively by the column's lowercase value.
    #[serde(default)]
    pub nocase: bool,
    #[serde(default)]
    pub order_desc: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "OrderByRepr", into = "OrderByRepr")]
pub enum OrderBy {
    Random,
    Distance(CoordOpts),
    Column(String),
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum OrderByRepr {
    Distance { distance: CoordOpts },
    Column(String),
}

const RANDOM: &str = "RANDOM()";

impl From<OrderByRepr> for OrderBy {
    fn from(repr: OrderByRepr) -> Self {
        match repr {
            OrderByRepr::Distance { distance } => OrderBy::Distance(distance),
            OrderByRepr::Column(column) if column == RANDOM => OrderBy::Random,
            OrderByRepr::Column(column) => OrderBy::Column(column),
        }
    }
}

impl From<OrderBy> for OrderByRepr {
    fn from(order_by: OrderBy) -> Self {
        match order_by {
            OrderBy::Random => OrderByRepr::Column(RANDOM.to_owned()),
            OrderBy::Distance(distance) => OrderByRepr::Distance { distance },
            OrderBy::Column(column) => OrderByRepr::Column(column),
        }
    }
}

/// Order by closeness of (`lat_field`, `long_field`) to (`lat`, `long`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoordOpts {
    pub lat_field: String,
    pub long_field: String,
    pub lat: NumberOrString,
    pub long: NumberOrString,
}

/// Numeric option that may arrive as a JSON number or a string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NumberOrString {
    Number(f64),
    String(String),
}

impl NumberOrString {
    /// The whole string must be numeric (surrounding whitespace allowed).
    pub fn as_f64(&self) -> Option<f64> {
        let n = match self {
            NumberOrString::Number(n) => *n,
            NumberOrString::String(s) if s.trim().is_empty() => 0.0,
            NumberOrString::String(s) => s.trim().parse().ok()?,
        };
        n.is_finite().then_some(n)
    }

    /// Rounded numbers, or the leading integer of a string (`"12abc"` is 12).
    /// Zero and empty values count as unset.
    pub fn as_limit(&self) -> Option<i64> {
        match self {
            NumberOrString::Number(n) if *n == 0.0 || !n.is_finite() => None,
            NumberOrString::Number(n) => Some(n.round() as i64),
            NumberOrString::String(s) => leading_int(s),
        }
    }
}

impl From<i64> for NumberOrString {
    fn from(n: i64) -> Self { NumberOrString::Number(n as f64) }
}
impl From<i32> for NumberOrString {
    fn from(n: i32) -> Self { NumberOrString::Number(n.into()) }
}
impl From<f64> for NumberOrString {
    fn from(n: f64) -> Self { NumberOrString::Number(n) }
}
impl From<&str> for NumberOrString {
    fn from(s: &str) -> Self { NumberOrString::String(s.to_owned()) }
}

fn leading_int(s: &str) -> Option<i64> {
    let s = s.trim_start();
    let (sign, digits) = match s.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, s.strip_prefix('+').unwrap_or(s)),
    };
    let end = digits.find(|c: char| !c.is_ascii_digit()).unwrap_or(digits.len());
    digits[..end].parse::<i64>().ok().map(|n| sign * n)
}

/// Compile ordering and paging into `ORDER BY ... LIMIT n OFFSET m`.
/// Unset parts are left out; everything unset yields an empty string.
pub fn mk_select_options(options: &SelectOptions) -> String {
    let direction = if options.order_desc { " DESC" } else { "" };
    let order_by = match &options.order_by {
        Some(OrderBy::Random) => Some(format!("ORDER BY {}", RANDOM)),
        Some(OrderBy::Distance(coords)) => distance_order(coords).map(|d| format!("ORDER BY {}", d)),
        Some(OrderBy::Column(column)) => column_order(column, options.nocase).map(|c| format!("ORDER BY {}{}", c, direction)),
        None => None,
    };
    let limit = options.limit.as_ref().and_then(NumberOrString::as_limit).map(|n| format!("LIMIT {}", n));
    let offset = options.offset.as_ref().and_then(NumberOrString::as_limit).map(|n| format!("OFFSET {}", n));

    [order_by, limit, offset].into_iter().flatten().collect::<Vec<_>>().join(" ")
}

fn column_order(column: &str, nocase: bool) -> Option<String> {
    let sanitized = sanitize_allow_dots(column);
    if sanitized.is_empty() {
        if !column.is_empty() {
            warn!("Ignoring ordering by {:?}, nothing left after sanitizing", column);
        }
        return None;
    }
    let quoted = quote(&sanitized);
    Some(if nocase { format!("lower({})", quoted) } else { quoted })
}

/// Squared distance in degrees, with longitude scaled by cos(lat) so both axes
/// are comparable. Only the ordering matters, so no square root is taken.
fn distance_order(coords: &CoordOpts) -> Option<String> {
    let (Some(lat), Some(long)) = (coords.lat.as_f64(), coords.long.as_f64()) else {
        warn!("Ignoring distance ordering with non-numeric coordinates {:?}", coords);
        return None;
    };
    let cos_lat_2 = lat.to_radians().cos().powi(2);
    let lat_field = quote(&sanitize_allow_dots(&coords.lat_field));
    let long_field = quote(&sanitize_allow_dots(&coords.long_field));
    Some(format!(
        "(({lat_field} - {lat})*({lat_field} - {lat})) + (({long_field} - {long})*({long_field} - {long})*{cos_lat_2})"
    ))
}
