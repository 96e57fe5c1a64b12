//! Manifest-driven applications.

use std::sync::Arc;

use serde_json::json;
use trails_runtime::prelude::*;

#[test]
fn string_and_object_forms_are_equivalent() {
    let short: ServiceManifest = serde_json::from_value(json!({
        "provides": "a.A",
        "references": { "b": "b.B" }
    }))
    .unwrap();
    let long: ServiceManifest = serde_json::from_value(json!({
        "provides": [{ "name": "a.A" }],
        "references": { "b": { "name": "b.B" } }
    }))
    .unwrap();

    assert_eq!(short, long);
}

#[test]
fn manifest_round_trips_through_json() {
    let manifest = PackageManifest::from_json(
        r#"{
            "name": "map",
            "services": {
                "map.MapModelImpl": {
                    "provides": ["map.MapModel", { "name": "map.Layer", "qualifier": "base" }],
                    "references": {
                        "http": "http.HttpService",
                        "layers": { "name": "map.Layer", "all": true }
                    }
                }
            }
        }"#,
    )
    .unwrap();

    let json = serde_json::to_string(&manifest).unwrap();
    assert_eq!(PackageManifest::from_json(&json).unwrap(), manifest);
}

struct Http;
impl Service for Http {}

struct Layer {
    name: String,
}
impl Service for Layer {}

struct MapModel {
    http: Arc<Http>,
    layers: Vec<String>,
}
impl Service for MapModel {}

fn http_package() -> ManifestPackage {
    ManifestPackage::from_json(
        r#"{
            "name": "http",
            "services": { "http.HttpServiceImpl": { "provides": "http.HttpService" } }
        }"#,
    )
    .unwrap()
    .with_factory("http.HttpServiceImpl", |_| Ok(Http))
}

fn map_package() -> ManifestPackage {
    ManifestPackage::from_json(
        r#"{
            "name": "map",
            "services": {
                "map.MapModelImpl": {
                    "provides": "map.MapModel",
                    "references": {
                        "http": "http.HttpService",
                        "layers": { "name": "map.Layer", "all": true }
                    }
                },
                "map.OsmLayer": { "provides": { "name": "map.Layer", "qualifier": "osm" } },
                "map.TopoLayer": { "provides": { "name": "map.Layer", "qualifier": "topo" } }
            },
            "properties": { "defaultLayer": "osm" }
        }"#,
    )
    .unwrap()
    .with_factory("map.MapModelImpl", |options| {
        let layers = options
            .references
            .get_all("layers")?
            .iter()
            .map(|layer| layer.downcast::<Layer>().map(|l| l.name.clone()))
            .collect::<Result<_, _>>()?;
        Ok(MapModel {
            http: options.references.get_as::<Http>("http")?,
            layers,
        })
    })
    .with_factory("map.OsmLayer", |_| Ok(Layer { name: "osm".into() }))
    .with_factory("map.TopoLayer", |_| Ok(Layer { name: "topo".into() }))
}

#[test]
fn application_wires_packages_across_manifests() {
    let container = Application::new()
        .add_packages(map_package())
        .add_packages(http_package())
        .start()
        .unwrap();

    let model = container.get_as::<MapModel>("map.MapModel").unwrap();
    assert_eq!(model.layers, ["osm", "topo"]);
    assert!(Arc::ptr_eq(
        &model.http,
        &container.get_as::<Http>("http.HttpService").unwrap()
    ));

    let topo = container.get_qualified("map.Layer", "topo").unwrap();
    assert_eq!(topo.id().as_str(), "map.TopoLayer");
}

#[test]
fn missing_package_surfaces_as_unresolved_reference() {
    let err = Application::new()
        .add_packages(map_package())
        .start()
        .unwrap_err();

    assert!(matches!(
        err,
        ContainerError::UnresolvedReference { ref interface, .. } if interface == "http.HttpService"
    ));
}

#[test]
fn package_group_builder_composes_manifest_packages() {
    let group = PackageGroupBuilder::new()
        .add(http_package())
        .add(map_package());
    assert_eq!(group.names(), ["http", "map"]);

    let container = Application::new().add_packages(group).start().unwrap();
    assert_eq!(container.len(), 4);
}
