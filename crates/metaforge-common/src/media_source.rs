//! Media sources (BLURAY, DVD, WEBRIP, ...) as an open-ended enumeration.
//!
//! The well-known sources follow the Kodi-compatible tokens used in release
//! names. Further sources may be declared from user configuration with
//! [`MediaSource::declare`], and any name read back from saved data resolves
//! through [`MediaSource::resolve`], creating a new member if needed.

use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwap;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::warn;

use crate::classifier::PatternClassifier;
use crate::dyna_enum::{DynaEnum, DynaEnumEvent, DynaEnumValue, ListenerId};

macro_rules! builtin_sources {
    ($( $fn_name:ident => ($name:literal, $ordinal:literal, $title:literal, $pattern:expr) ),* $(,)?) => {
        const BUILTINS: &[(&str, usize, &str, Option<&str>)] = &[
            $( ($name, $ordinal, $title, $pattern), )*
        ];

        impl MediaSource {
            $(
                #[doc = concat!("The built-in `", $name, "` source.")]
                pub fn $fn_name() -> Self {
                    Self::resolve($name)
                }
            )*
        }
    };
}

builtin_sources! {
    bluray => ("BLURAY", 0, "Bluray", Some("bluray|blueray|bdrip|brrip|dbrip|bd25|bd50|bdmv|blu-ray")),
    dvd => ("DVD", 1, "DVD", Some("dvd|video_ts|dvdrip|dvdr|r5")),
    tv => ("TV", 2, "TV", Some("hdtv|pdtv|dsr|dtv|hdtvrip|tvrip|dvbrip")),
    hddvd => ("HDDVD", 3, "HDDVD", Some("hddvd|hddvdrip")),
    vhs => ("VHS", 4, "VHS", Some("vhs")),
    hdrip => ("HDRIP", 5, "HDRip", Some("hdrip")),
    cam => ("CAM", 6, "Cam", Some("cam")),
    telesync => ("TS", 7, "Telesync", Some("ts|telesync|hdts|ht-ts")),
    telecine => ("TC", 8, "Telecine", Some("tc|telecine|hdtc|ht-tc")),
    dvd_screener => ("DVDSCR", 9, "DVD Screener", Some("dvdscr")),
    r5 => ("R5", 10, "R5", Some("r5")),
    webrip => ("WEBRIP", 11, "Webrip", Some("webrip")),
    web_dl => ("WEB_DL", 12, "Web-DL", Some("web-dl|webdl")),
    stream => ("STREAM", 13, "Stream", None),
    unknown => ("UNKNOWN", 14, "Unknown", None),
}

/// Order in which built-in patterns are tried. Declared sources follow, by
/// ordinal.
const PRIORITY: &[&str] = &[
    "BLURAY", "HDDVD", "DVDSCR", "DVD", "WEB_DL", "WEBRIP", "HDRIP", "TV", "VHS", "R5", "TS",
    "TC", "CAM",
];

struct MediaSourceTable {
    registry: DynaEnum,
    classifier: ArcSwap<PatternClassifier>,
    /// Held from registration until the rebuilt classifier is stored, so a
    /// slower rebuild never overwrites a newer one.
    declare: Mutex<()>,
}

impl MediaSourceTable {
    fn new() -> Self {
        let registry = DynaEnum::new("media_source");
        for (name, ordinal, title, pattern) in BUILTINS {
            registry.register_static(name, *ordinal, Some(*title), *pattern);
        }
        let classifier =
            build_classifier(&registry).expect("built-in media source patterns compile");
        Self {
            registry,
            classifier: ArcSwap::from_pointee(classifier),
            declare: Mutex::new(()),
        }
    }
}

fn build_classifier(registry: &DynaEnum) -> Result<PatternClassifier, regex::Error> {
    PatternClassifier::builder(registry)
        .priority(PRIORITY.iter().copied())
        .extension("strm", "STREAM")
        .unknown("UNKNOWN")
        .build()
}

static TABLE: Lazy<MediaSourceTable> = Lazy::new(MediaSourceTable::new);

/// A media source value. Cheap to clone; equal when the names are equal.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct MediaSource(Arc<DynaEnumValue>);

impl MediaSource {
    /// Resolve a name (symbolic name or display title), creating a new
    /// source if it is unknown.
    pub fn resolve(name: &str) -> Self {
        Self(TABLE.registry.resolve(name))
    }

    /// Look up an existing source without creating one.
    pub fn get(name: &str) -> Option<Self> {
        TABLE.registry.lookup(name).map(Self)
    }

    /// Declare a source with a matcher pattern, typically from configuration.
    ///
    /// The classifier is rebuilt so the new pattern takes effect immediately.
    /// An invalid pattern is rejected before anything is registered.
    pub fn declare(name: &str, title: &str, pattern: Option<&str>) -> Result<Self, regex::Error> {
        if let Some(pattern) = pattern {
            regex::Regex::new(pattern).inspect_err(|e| {
                warn!(name, error = %e, "Invalid media source pattern");
            })?;
        }
        let _guard = TABLE.declare.lock();
        let value = TABLE.registry.register_next(name, Some(title), pattern);
        if value.pattern().is_some() {
            TABLE
                .classifier
                .store(Arc::new(build_classifier(&TABLE.registry)?));
        }
        Ok(Self(value))
    }

    /// All sources, sorted by display title.
    pub fn values() -> Vec<Self> {
        TABLE.registry.values().into_iter().map(Self).collect()
    }

    pub fn add_listener<F>(listener: F) -> ListenerId
    where
        F: Fn(&DynaEnumEvent) + Send + Sync + 'static,
    {
        TABLE.registry.add_listener(listener)
    }

    pub fn remove_listener(id: ListenerId) -> bool {
        TABLE.registry.remove_listener(id)
    }

    pub fn name(&self) -> &str {
        self.0.name()
    }

    pub fn title(&self) -> &str {
        self.0.title().unwrap_or(self.0.name())
    }

    pub fn ordinal(&self) -> usize {
        self.0.ordinal()
    }

    pub fn value(&self) -> &Arc<DynaEnumValue> {
        &self.0
    }
}

/// Detect the media source from a file name or release name.
///
/// Falls back to `STREAM` for `.strm` files and `UNKNOWN` otherwise.
pub fn classify(text: &str) -> MediaSource {
    MediaSource(TABLE.classifier.load().classify(text))
}

impl fmt::Display for MediaSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

impl fmt::Debug for MediaSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MediaSource({})", self.name())
    }
}

impl Serialize for MediaSource {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for MediaSource {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(Self::resolve(&name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_release_names() {
        let cases = [
            ("The.Matrix.1999.1080p.BluRay.x264-GRP.mkv", "BLURAY"),
            ("Movie.2010.BDRip.XviD", "BLURAY"),
            ("Movie.2010.Blu-ray.Remux", "BLURAY"),
            ("Movie 2010 DVDRip", "DVD"),
            ("Movie/VIDEO_TS/VTS_01_1.VOB", "DVD"),
            ("Show.S01E01.HDTV.x264", "TV"),
            ("Movie.2010.HDDVD.x264", "HDDVD"),
            ("Movie.1985.VHSRip", "UNKNOWN"),
            ("Movie.1985.VHS.avi", "VHS"),
            ("Movie.2010.HDRip", "HDRIP"),
            ("Movie.2010.CAM.avi", "CAM"),
            ("Movie.2010.TELESYNC", "TS"),
            ("Movie.2010.HDTC", "TC"),
            ("Movie.2010.DVDSCR", "DVDSCR"),
            ("Movie.2010.WEBRip.x264", "WEBRIP"),
            ("Movie.2010.WEB-DL.x264", "WEB_DL"),
            ("Movie.2010.webdl", "WEB_DL"),
            ("Movie [BluRay]", "BLURAY"),
            ("Movie (dvd)", "DVD"),
        ];
        for (text, expected) in cases {
            assert_eq!(classify(text).name(), expected, "{text}");
        }
    }

    #[test]
    fn glued_tokens_do_not_match() {
        for text in ["Camouflage.2010.mkv", "Tsunami.2004.mkv", "Webripper.mkv", "ADVDX.mkv"] {
            assert_eq!(classify(text), MediaSource::unknown(), "{text}");
        }
    }

    #[test]
    fn strm_extension_means_stream() {
        assert_eq!(classify("Inception.2010.strm"), MediaSource::stream());
        assert_eq!(classify("Inception.2010.mkv"), MediaSource::unknown());
    }

    #[test]
    fn resolve_by_title_and_fabricate() {
        assert_eq!(MediaSource::resolve("Web-DL"), MediaSource::web_dl());
        assert_eq!(MediaSource::resolve("dvd screener"), MediaSource::dvd_screener());

        let fabricated = MediaSource::resolve("TEST_LASERDISC_SOURCE");
        assert_eq!(fabricated.title(), "TEST_LASERDISC_SOURCE");
        assert_eq!(MediaSource::resolve("TEST_LASERDISC_SOURCE"), fabricated);
        assert!(MediaSource::get("TEST_LASERDISC_SOURCE").is_some());
    }

    #[test]
    fn declared_sources_join_the_classifier() {
        let declared =
            MediaSource::declare("TEST_UHD_BLURAY", "UHD Bluray", Some("uhdbd|uhd-bluray")).unwrap();
        assert_eq!(classify("Movie.2019.UHDBD.2160p"), declared);
        // Built-ins keep priority.
        assert_eq!(classify("Movie.2019.BluRay.uhdbd"), MediaSource::bluray());
    }

    #[test]
    fn concurrent_declarations_all_classify() {
        let declared: Vec<MediaSource> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|i| {
                    scope.spawn(move || {
                        let name = format!("TEST_PARALLEL_{i}");
                        let pattern = format!("parallelsrc{i}");
                        MediaSource::declare(&name, &name, Some(&pattern)).unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        for (i, source) in declared.iter().enumerate() {
            assert_eq!(&classify(&format!("Movie.2010.parallelsrc{i}.mkv")), source);
        }
        let mut ordinals: Vec<usize> = declared.iter().map(MediaSource::ordinal).collect();
        ordinals.sort_unstable();
        ordinals.dedup();
        assert_eq!(ordinals.len(), declared.len());
    }

    #[test]
    fn invalid_declared_pattern_is_rejected() {
        assert!(MediaSource::declare("TEST_BROKEN_SOURCE", "Broken", Some("(")).is_err());
        assert!(MediaSource::get("TEST_BROKEN_SOURCE").is_none());
        assert_eq!(classify("Movie.bluray"), MediaSource::bluray());
    }

    #[test]
    fn values_are_sorted_by_title() {
        let titles: Vec<String> = MediaSource::values()
            .iter()
            .map(|v| v.title().to_lowercase())
            .collect();
        let mut sorted = titles.clone();
        sorted.sort();
        assert_eq!(titles, sorted);
    }

    #[test]
    fn serde_round_trips_through_name() {
        let json = serde_json::to_string(&MediaSource::webrip()).unwrap();
        assert_eq!(json, "\"WEBRIP\"");
        let back: MediaSource = serde_json::from_str("\"Webrip\"").unwrap();
        assert_eq!(back, MediaSource::webrip());
    }
}
