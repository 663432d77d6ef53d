//! HTTP clients for the services eventmap talks to.

pub mod arcgis;
pub mod listing;
