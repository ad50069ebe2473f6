//! Parser for the HTML plot summary page (`/title/<id>/plotsummary`).
//!
//! The plot is the first non-blank summary paragraph. When the page comes
//! from a localized mirror of the site, its `#tn15title .main` heading also
//! carries the localized title.

use metaforge_common::Result;
use scraper::Html;

use super::{clean_text, normalize_whitespace, own_text, selector, RequestContext, SourceParser};
use crate::metadata::fetcher::Document;
use crate::metadata::model::{non_blank, PartialMetadata};

const SOURCE: &str = "imdb:plot";

/// Plot summary parser.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlotParser {
    /// Take the title from the page heading as well.
    pub localized_title: bool,
}

impl PlotParser {
    pub fn new(localized_title: bool) -> Self {
        Self { localized_title }
    }
}

impl SourceParser for PlotParser {
    fn name(&self) -> &'static str {
        SOURCE
    }

    fn parse(&self, document: &Document, ctx: &RequestContext) -> Result<PartialMetadata> {
        let html = Html::parse_document(document.as_html(SOURCE)?);
        let root = html.root_element();
        let mut partial = PartialMetadata::new(SOURCE, ctx.media_type);

        let summaries = selector(
            SOURCE,
            "p.plotSummary, p.plotpar, li.ipl-zebra-list__item > p",
        )?;
        partial.record.plot = root
            .select(&summaries)
            .map(|p| strip_attribution(&clean_text(p)))
            .find(|text| !text.is_empty());

        if self.localized_title {
            let heading = selector(SOURCE, "#tn15title .main")?;
            if let Some(main) = root.select(&heading).next() {
                partial.record.title = non_blank(own_text(main));
            }
        }

        Ok(partial)
    }
}

/// Drop a trailing `Written by ...` or dash-prefixed author attribution.
fn strip_attribution(text: &str) -> String {
    let text = match text.find("Written by") {
        Some(idx) => &text[..idx],
        None => text,
    };
    let text = match text.rfind('\u{2014}') {
        Some(idx) if idx > 0 => &text[..idx],
        _ => text,
    };
    normalize_whitespace(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html><body>
<div id="tn15title"><h1><span class="main">Origen</span></h1></div>
<p class="plotSummary">   </p>
<p class="plotSummary">A thief who steals corporate secrets through dream-sharing
  technology. <i>Written by</i> someone@example.com</p>
</body></html>"#;

    fn parse(parser: PlotParser) -> PartialMetadata {
        parser
            .parse(&Document::Html(PAGE.to_string()), &RequestContext::default())
            .unwrap()
    }

    #[test]
    fn first_non_blank_summary_wins() {
        let partial = parse(PlotParser::default());
        assert_eq!(
            partial.record.plot.as_deref(),
            Some("A thief who steals corporate secrets through dream-sharing technology.")
        );
        assert!(partial.record.title.is_none());
    }

    #[test]
    fn localized_title_is_optional() {
        let partial = parse(PlotParser::new(true));
        assert_eq!(partial.record.title.as_deref(), Some("Origen"));
    }

    #[test]
    fn strips_dash_attribution() {
        assert_eq!(
            strip_attribution("A heist in dreams. \u{2014}Anonymous"),
            "A heist in dreams."
        );
    }
}
