use crate::config_error;
use crate::error::{ConfigResult, ErrorKind};
use crate::properties::PropertySource;

/// Key listing the data sources, comma separated.
pub const DATA_SOURCE: &str = "data_source";

const DATA_SOURCE_SEPARATOR: char = ',';

/// Parses the ordered list of data source names.
///
/// Whitespace anywhere in the value is removed and empty segments are dropped. The order is
/// kept: it drives provider resolution and therefore which source first claims a target table.
pub fn resolve_data_sources<P>(properties: &P) -> ConfigResult<Vec<String>>
where
    P: PropertySource,
{
    let raw = properties.get(DATA_SOURCE).ok_or_else(|| {
        config_error!(
            ErrorKind::MissingRequiredField,
            "At least one data source must be configured"
        )
        .with_key(DATA_SOURCE)
    })?;

    let stripped: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    let sources: Vec<String> = stripped
        .split(DATA_SOURCE_SEPARATOR)
        .filter(|name| !name.is_empty())
        .map(str::to_owned)
        .collect();

    if sources.is_empty() {
        return Err(config_error!(
            ErrorKind::MissingRequiredField,
            "At least one data source must be configured"
        )
        .with_key(DATA_SOURCE)
        .with_value(raw));
    }

    Ok(sources)
}
