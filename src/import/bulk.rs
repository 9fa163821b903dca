use std::{fs, path::Path};

use anyhow::Context;
use indicatif::ProgressBar;

use crate::{
    notify::Notifier,
    reconcile::reconciler::Reconciler,
    remote::client::GeoDataApi,
    store::{cache::CacheStore, record::Identifier},
    surface::map_surface::MapSurface,
};

use super::document::{parse_document, parse_feature, ImportError};

/// Extensions the upload offers. The content is always read as GeoJSON, whatever the extension.
pub const ADVERTISED_EXTENSIONS: [&str; 2] = ["geojson", "kml"];

#[derive(Debug, Default)]
pub struct ImportReport {
    pub created: Vec<Identifier>,
    /// Index of the feature within the document and why it was not created.
    pub failed: Vec<(usize, ImportError)>,
}

/// Read an uploaded file whole.
pub fn read_import_file(filepath: &Path) -> anyhow::Result<String> {
    let advertised = filepath
        .extension()
        .and_then(|extension| extension.to_str())
        .map_or(false, |extension| {
            ADVERTISED_EXTENSIONS.contains(&extension.to_lowercase().as_str())
        });
    if !advertised {
        log::warn!(
            "{:?} is not a .geojson or .kml file, reading it as GeoJSON anyway",
            filepath
        );
    }
    fs::read_to_string(filepath).with_context(|| format!("Reading import file {:?}", filepath))
}

/// Create every feature of an uploaded document on the server, then reload the full list.
///
/// A document that is not JSON, or whose type is neither `Feature` nor `FeatureCollection`, is
/// rejected before any create call. Within a collection each feature is created independently;
/// failures are logged and reported without stopping the others. An unauthorized response ends
/// the import, the session is gone.
pub fn import_geojson<G, C, S, N>(
    reconciler: &mut Reconciler<G, C, S, N>,
    contents: &str,
) -> anyhow::Result<ImportReport>
where
    G: GeoDataApi,
    C: CacheStore,
    S: MapSurface,
    N: Notifier,
{
    let features = parse_document(contents)
        .map_err(|err| {
            log::error!("Failed to upload geo data: {}", err);
            err
        })?
        .into_features();

    log::info!("Importing {} features", features.len());
    let mut report = ImportReport::default();
    let bar = ProgressBar::new(features.len() as u64);
    for (index, value) in features.into_iter().enumerate() {
        let result = parse_feature(value).and_then(|feature| {
            reconciler
                .create_remote(&feature)
                .map_err(ImportError::from)
        });
        match result {
            Ok(id) => report.created.push(id),
            Err(ImportError::Remote(err)) if err.is_unauthorized() => {
                bar.abandon();
                return Err(err.into());
            }
            Err(err) => {
                log::error!("Error creating geo data for feature {}: {}", index, err);
                report.failed.push((index, err));
            }
        }
        bar.inc(1);
    }
    bar.finish_and_clear();
    log::info!(
        "Created {} features, {} failed",
        report.created.len(),
        report.failed.len()
    );

    reconciler.refresh_from_remote()?;
    Ok(report)
}

pub fn import_file<G, C, S, N>(
    reconciler: &mut Reconciler<G, C, S, N>,
    filepath: &Path,
) -> anyhow::Result<ImportReport>
where
    G: GeoDataApi,
    C: CacheStore,
    S: MapSurface,
    N: Notifier,
{
    let contents = read_import_file(filepath)?;
    import_geojson(reconciler, &contents)
}

#[cfg(test)]
mod tests {
    use std::{collections::HashSet, fs};

    use rstest::{fixture, rstest};
    use testdir::testdir;

    use crate::{
        import::document::ImportError,
        notify::testing::RecordingNotifier,
        reconcile::reconciler::Reconciler,
        remote::{error::RemoteError, fake::FakeGeoDataApi},
        store::{
            cache::{CacheStore, MemoryCache},
            feature_store::FeatureStore,
            record::{FeatureRecord, Identifier},
        },
        surface::map_surface::FeatureGroup,
    };

    use super::{import_file, import_geojson};

    type TestReconciler = Reconciler<FakeGeoDataApi, MemoryCache, FeatureGroup, RecordingNotifier>;

    const COLLECTION: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {"type": "Feature", "geometry": {"type": "Point", "coordinates": [1, 1]}, "properties": {"name": "A"}},
            {"type": "Feature", "geometry": {"type": "Point", "coordinates": [2, 2]}, "properties": {"name": "B"}},
            {"type": "Feature", "geometry": {"type": "Point", "coordinates": [3, 3]}, "properties": {"name": "C"}}
        ]
    }"#;

    fn existing_record() -> FeatureRecord {
        FeatureRecord::from_raw(
            Identifier::Number(1),
            serde_json::json!({
                "type": "Feature",
                "geometry": {"type": "Point", "coordinates": [0.0, 0.0]},
                "properties": {"id": 1, "name": "existing"}
            }),
        )
    }

    fn reconciler_with(api: FakeGeoDataApi) -> TestReconciler {
        let mut store = FeatureStore::new(MemoryCache::new());
        store.hydrate_from_remote(api.records()).unwrap();
        let mut reconciler =
            Reconciler::new(api, store, FeatureGroup::new(), RecordingNotifier::default());
        reconciler.render();
        reconciler
    }

    #[fixture]
    fn api() -> FakeGeoDataApi {
        FakeGeoDataApi::with_records(vec![existing_record()])
    }

    fn stored_names(reconciler: &TestReconciler) -> HashSet<String> {
        reconciler
            .store()
            .records()
            .iter()
            .filter_map(|record| record.data["properties"]["name"].as_str())
            .map(str::to_string)
            .collect()
    }

    fn names(expected: &[&str]) -> HashSet<String> {
        expected.iter().map(|name| name.to_string()).collect()
    }

    #[rstest]
    fn test_import_collection(api: FakeGeoDataApi) {
        let mut reconciler = reconciler_with(api);

        let report = import_geojson(&mut reconciler, COLLECTION).unwrap();

        assert_eq!(3, report.created.len());
        assert!(report.failed.is_empty());
        assert_eq!(names(&["existing", "A", "B", "C"]), stored_names(&reconciler));
        assert_eq!(4, reconciler.surface().len());
        assert_eq!(1, reconciler.api().list_calls());
    }

    #[rstest]
    fn test_import_mixed_success(api: FakeGeoDataApi) {
        let api = api.fail_create_call(2, RemoteError::Transport("connection reset".to_string()));
        let mut reconciler = reconciler_with(api);

        let report = import_geojson(&mut reconciler, COLLECTION).unwrap();

        assert_eq!(3, reconciler.api().create_calls());
        assert_eq!(2, report.created.len());
        assert_eq!(1, report.failed.len());
        assert_eq!(1, report.failed[0].0);
        // The store holds exactly what the server listed after the import.
        assert_eq!(names(&["existing", "A", "C"]), stored_names(&reconciler));
        assert_eq!(reconciler.api().records(), reconciler.store().records());
        // Import failures are not alerted.
        assert!(reconciler.notifier().alerts().is_empty());
    }

    #[rstest]
    fn test_import_skips_malformed_feature(api: FakeGeoDataApi) {
        let mut reconciler = reconciler_with(api);
        let contents = r#"{"type": "FeatureCollection", "features": [
            {"type": "Feature", "geometry": null, "properties": {"name": "broken"}},
            {"type": "Feature", "geometry": {"type": "Point", "coordinates": [2, 2]}, "properties": {"name": "B"}}
        ]}"#;

        let report = import_geojson(&mut reconciler, contents).unwrap();

        assert_eq!(1, reconciler.api().create_calls());
        assert!(matches!(report.failed[0], (0, ImportError::InvalidFeature(_))));
        assert_eq!(names(&["existing", "B"]), stored_names(&reconciler));
    }

    #[rstest]
    fn test_import_single_feature(api: FakeGeoDataApi) {
        let mut reconciler = reconciler_with(api);
        let contents = r#"{"type": "Feature", "geometry": {"type": "LineString", "coordinates": [[0, 0], [5, 5]]}, "properties": {"name": "road"}}"#;

        let report = import_geojson(&mut reconciler, contents).unwrap();

        assert_eq!(1, report.created.len());
        assert_eq!(names(&["existing", "road"]), stored_names(&reconciler));
    }

    #[rstest]
    #[case(r#"{"type": "Polygon", "coordinates": [[[0, 0], [1, 0], [1, 1], [0, 0]]]}"#)]
    #[case(r#"{"type": "FeatureCollection"}"#)]
    #[case("<kml></kml>")]
    fn test_rejected_document_changes_nothing(api: FakeGeoDataApi, #[case] contents: &str) {
        let mut reconciler = reconciler_with(api);
        let writes_before = reconciler.store().cache().writes();

        assert!(import_geojson(&mut reconciler, contents).is_err());

        assert_eq!(0, reconciler.api().create_calls());
        assert_eq!(0, reconciler.api().list_calls());
        assert_eq!(vec![existing_record()], reconciler.store().records());
        assert_eq!(writes_before, reconciler.store().cache().writes());
    }

    #[rstest]
    fn test_unauthorized_create_stops_import(api: FakeGeoDataApi) {
        let api = api.fail_create_call(1, RemoteError::Unauthorized);
        let mut reconciler = reconciler_with(api);

        assert!(import_geojson(&mut reconciler, COLLECTION).is_err());

        assert_eq!(1, reconciler.api().create_calls());
        assert_eq!(vec![existing_record()], reconciler.store().records());
    }

    #[rstest]
    fn test_import_file(api: FakeGeoDataApi) {
        let filepath = testdir!().join("shapes.geojson");
        fs::write(&filepath, COLLECTION).unwrap();
        let mut reconciler = reconciler_with(api);

        let report = import_file(&mut reconciler, &filepath).unwrap();

        assert_eq!(3, report.created.len());
        let cached = reconciler.store().cache().load().unwrap().unwrap();
        assert_eq!(reconciler.store().records(), cached.as_slice());
    }
}
