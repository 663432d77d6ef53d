//! eventmap configuration.
//!
//! Read from `~/.config/eventmap/config.toml` (or an explicit path), with
//! `EVENTMAP_*` environment variables layered on top so credentials can stay
//! out of the file, e.g. `EVENTMAP_SOURCE__TOKEN` or `EVENTMAP_ARCGIS__PASSWORD`.

use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use serde::Deserialize;
use url::Url;

use crate::error::{SyncError, SyncResult};

static DEFAULT_STORE_PATH: &str = "events.json";
static DEFAULT_PORTAL_URL: &str = "https://www.arcgis.com";
static DEFAULT_GEOCODER_URL: &str = "https://geocode.arcgis.com/arcgis/rest/services/World/GeocodeServer/findAddressCandidates";

fn default_store_path() -> PathBuf {
    PathBuf::from(DEFAULT_STORE_PATH)
}

fn default_city() -> String {
    "Austin".to_string()
}

fn default_region() -> String {
    "Texas".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventmapConfig {
    /// JSON file holding the working set between runs.
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,

    pub source: Option<SourceConfig>,

    pub arcgis: Option<ArcgisConfig>,

    #[serde(default)]
    pub geocoder: GeocoderConfig,

    pub feature_layer: Option<FeatureLayerConfig>,
}

/// Event listing API.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub endpoint: Url,
    pub token: String,
}

/// ArcGIS Online account used for geocoding and the feature layer.
#[derive(Debug, Clone, Deserialize)]
pub struct ArcgisConfig {
    pub username: String,
    pub password: String,

    /// Referer tokens are issued for. Defaults to the portal URL.
    pub referer: Option<Url>,

    /// Defaults to ArcGIS Online.
    pub portal_url: Option<Url>,

    /// Defaults to `<portal_url>/sharing/rest/generateToken`.
    pub token_url: Option<Url>,
}

impl ArcgisConfig {
    pub fn portal_url(&self) -> SyncResult<Url> {
        or_default(self.portal_url.as_ref(), DEFAULT_PORTAL_URL)
    }

    pub fn referer(&self) -> SyncResult<Url> {
        match &self.referer {
            Some(url) => Ok(url.clone()),
            None => self.portal_url(),
        }
    }

    pub fn token_url(&self) -> SyncResult<Url> {
        match &self.token_url {
            Some(url) => Ok(url.clone()),
            None => join_path(&self.portal_url()?, "sharing/rest/generateToken"),
        }
    }

    pub fn item_url(&self, item_id: &str) -> SyncResult<Url> {
        join_path(&self.portal_url()?, &format!("sharing/rest/content/items/{item_id}"))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeocoderConfig {
    /// Defaults to the ArcGIS World Geocoding Service.
    pub url: Option<Url>,

    #[serde(default = "default_city")]
    pub city: String,

    #[serde(default = "default_region")]
    pub region: String,
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        GeocoderConfig {
            url: None,
            city: default_city(),
            region: default_region(),
        }
    }
}

impl GeocoderConfig {
    pub fn url(&self) -> SyncResult<Url> {
        or_default(self.url.as_ref(), DEFAULT_GEOCODER_URL)
    }
}

/// Either a layer URL, or a portal item id plus layer index to resolve.
#[derive(Debug, Clone, Deserialize)]
pub struct FeatureLayerConfig {
    pub url: Option<Url>,
    pub service_id: Option<String>,
    #[serde(default)]
    pub layer_id: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LayerTarget {
    Url(Url),
    Item { service_id: String, layer_id: u32 },
}

impl FeatureLayerConfig {
    pub fn target(&self) -> SyncResult<LayerTarget> {
        match (&self.url, &self.service_id) {
            (Some(url), _) => Ok(LayerTarget::Url(url.clone())),
            (None, Some(service_id)) => Ok(LayerTarget::Item {
                service_id: service_id.clone(),
                layer_id: self.layer_id,
            }),
            (None, None) => Err(SyncError::Config(
                "[feature_layer] needs either `url` or `service_id`".into(),
            )),
        }
    }
}

impl EventmapConfig {
    pub fn default_path() -> SyncResult<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| SyncError::Config("Could not determine config directory".into()))?
            .join("eventmap");

        Ok(config_dir.join("config.toml"))
    }

    /// Load config from `path`, or the default location when `None`.
    ///
    /// An explicit path must exist; the default one may be absent as long as
    /// the environment supplies what the command needs.
    pub fn load(path: Option<&Path>) -> SyncResult<Self> {
        let (path, required) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (Self::default_path()?, false),
        };

        Config::builder()
            .add_source(File::from(path).required(required))
            .add_source(
                Environment::with_prefix("EVENTMAP")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()
            .map_err(|e| SyncError::Config(e.to_string()))?
            .try_deserialize()
            .map_err(|e| SyncError::Config(e.to_string()))
    }

    /// Store path with `~` expanded.
    pub fn store_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.store_path.to_string_lossy()).into_owned())
    }

    pub fn source(&self) -> SyncResult<&SourceConfig> {
        self.source
            .as_ref()
            .ok_or_else(|| SyncError::Config("missing [source] section".into()))
    }

    pub fn arcgis(&self) -> SyncResult<&ArcgisConfig> {
        self.arcgis
            .as_ref()
            .ok_or_else(|| SyncError::Config("missing [arcgis] section".into()))
    }

    pub fn feature_layer(&self) -> SyncResult<&FeatureLayerConfig> {
        self.feature_layer
            .as_ref()
            .ok_or_else(|| SyncError::Config("missing [feature_layer] section".into()))
    }
}

fn parse_url(url: &str) -> SyncResult<Url> {
    Url::parse(url).map_err(|e| SyncError::Config(format!("invalid url {url}: {e}")))
}

fn or_default(url: Option<&Url>, default: &str) -> SyncResult<Url> {
    match url {
        Some(url) => Ok(url.clone()),
        None => parse_url(default),
    }
}

fn join_path(base: &Url, path: &str) -> SyncResult<Url> {
    parse_url(&format!("{}/{}", base.as_str().trim_end_matches('/'), path))
}
