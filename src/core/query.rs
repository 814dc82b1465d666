// History query construction

use crate::core::constants::*;
use crate::core::error::{PimsError, Result};
use crate::core::format::PimsWindow;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

// Everything but unreserved characters and '/' is escaped.
const QUERY_ESCAPE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'_')
    .remove(b'.')
    .remove(b'-')
    .remove(b'~')
    .remove(b'/');

/// One ready-to-send History call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryQuery {
    pub url: String,
    pub xml: String,
    pub method: RequestMethod,
}

impl HistoryQuery {
    /// URL for a GET: the percent-encoded XML appended after `?`.
    pub fn get_url(&self) -> String {
        format!("{}?{}", self.url, utf8_percent_encode(&self.xml, QUERY_ESCAPE))
    }
}

#[derive(Debug, Clone)]
pub struct QueryBuilder {
    base_url: String,
    method: RequestMethod,
}

impl QueryBuilder {
    pub fn new(scheme: &str, server: &str, method: RequestMethod) -> Self {
        let server = server.trim_end_matches('/');
        Self {
            base_url: format!("{}://{}{}", scheme, server, HISTORY_PATH),
            method,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn build(&self, tag: &str, data_source: &str, window: PimsWindow) -> HistoryQuery {
        HistoryQuery {
            url: self.base_url.clone(),
            xml: history_xml(tag, data_source, window),
            method: self.method,
        }
    }
}

const CDATA_END: &str = "]]>";

/// Names are sent inside CDATA sections, which cannot contain their own terminator.
pub fn check_quotable(field: &'static str, value: &str) -> Result<()> {
    if value.contains(CDATA_END) {
        return Err(PimsError::UnquotableName {
            field,
            value: value.to_string(),
        });
    }
    Ok(())
}

pub fn history_xml(tag: &str, data_source: &str, window: PimsWindow) -> String {
    let data_source = if data_source.trim().is_empty() {
        DEFAULT_DATA_SOURCE
    } else {
        data_source
    };

    format!(
        "<Q f=\"d\" allQuotes=\"1\"><Tag>\
         <N><![CDATA[{tag}]]></N>\
         <D><![CDATA[{data_source}]]></D>\
         <F><![CDATA[{field}]]></F>\
         <HF>0</HF>\
         <St>{start}</St>\
         <Et>{stop}</Et>\
         <RT>0</RT>\
         <X>{rows}</X>\
         <O>1</O>\
         </Tag></Q>",
        tag = tag,
        data_source = data_source,
        field = VALUE_FIELD,
        start = window.start,
        stop = window.stop,
        rows = MAX_ROWS_PER_CALL,
    )
}
