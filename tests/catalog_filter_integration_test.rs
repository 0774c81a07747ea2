/*!
 * Integration tests for catalog reading and operator filtering
 */

use ferry::catalog::{read_catalog, CatalogFilter, IncludeChannel, IncludeConfig, IncludePackage};
use ferry::{ImageType, MirrorError};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn digest(n: u32) -> String {
    format!("sha256:{:064x}", n)
}

fn bundle_json(name: &str, package: &str, n: u32) -> String {
    format!(
        r#"{{"schema":"olm.bundle","name":"{name}","package":"{package}","image":"quay.io/operators/{package}-bundle@{d}","relatedImages":[{{"name":"operator","image":"quay.io/operators/{package}@{r}"}},{{"name":"bundle","image":"quay.io/operators/{package}-bundle@{d}"}}]}}"#,
        name = name,
        package = package,
        d = digest(n),
        r = digest(n + 1000),
    )
}

/// etcd: stable (0.9.0, 0.9.2, 0.9.4, 1.0.0-rc1) and alpha (1.0.0); default stable
fn write_etcd(dir: &Path) {
    let mut json = String::new();
    json.push_str(r#"{"schema":"olm.package","name":"etcd","defaultChannel":"stable"}"#);
    json.push('\n');
    json.push_str(
        r#"{"schema":"olm.channel","name":"stable","package":"etcd","entries":[
            {"name":"etcd.v0.9.0"},
            {"name":"etcd.v0.9.2","replaces":"etcd.v0.9.0"},
            {"name":"etcd.v0.9.4","replaces":"etcd.v0.9.2"},
            {"name":"etcd.v1.0.0-rc1","replaces":"etcd.v0.9.4"}]}"#,
    );
    json.push('\n');
    json.push_str(
        r#"{"schema":"olm.channel","name":"alpha","package":"etcd","entries":[{"name":"etcd.v1.0.0"}]}"#,
    );
    json.push('\n');
    for (i, name) in ["etcd.v0.9.0", "etcd.v0.9.2", "etcd.v0.9.4", "etcd.v1.0.0-rc1", "etcd.v1.0.0"]
        .iter()
        .enumerate()
    {
        json.push_str(&bundle_json(name, "etcd", i as u32 + 1));
        json.push('\n');
    }
    json.push_str(r#"{"schema":"olm.deprecations","package":"etcd","entries":[]}"#);
    fs::create_dir_all(dir.join("etcd")).unwrap();
    fs::write(dir.join("etcd").join("catalog.json"), json).unwrap();
}

/// nginx as a multi-document YAML file
fn write_nginx(dir: &Path) {
    let yaml = format!(
        "---\nschema: olm.package\nname: nginx\ndefaultChannel: stable\n\
         ---\nschema: olm.channel\nname: stable\npackage: nginx\nentries:\n  - name: nginx.v2.1.0\n  - name: nginx.v2.2.0\n    replaces: nginx.v2.1.0\n\
         ---\nschema: olm.bundle\nname: nginx.v2.1.0\npackage: nginx\nimage: quay.io/operators/nginx-bundle@{}\n\
         ---\nschema: olm.bundle\nname: nginx.v2.2.0\npackage: nginx\nimage: quay.io/operators/nginx-bundle@{}\n\
         relatedImages:\n  - name: server\n    image: docker.io/library/nginx:1.25\n  - name: local\n    image: oci:///tmp/layout/nginx:1.25\n",
        digest(50),
        digest(51)
    );
    fs::create_dir_all(dir.join("nginx")).unwrap();
    fs::write(dir.join("nginx").join("catalog.yaml"), yaml).unwrap();
}

fn catalog_dir() -> TempDir {
    let dir = TempDir::new().unwrap();
    write_etcd(dir.path());
    write_nginx(dir.path());
    fs::write(dir.path().join("README.md"), "not a catalog").unwrap();
    dir
}

fn include(packages: Vec<IncludePackage>) -> IncludeConfig {
    IncludeConfig { packages }
}

#[test]
fn test_reads_json_stream_and_yaml_documents() {
    let dir = catalog_dir();
    let catalog = read_catalog(dir.path()).unwrap();

    assert_eq!(catalog.packages.len(), 2);
    assert_eq!(catalog.channels.len(), 3);
    assert_eq!(catalog.bundles.len(), 7);
    assert_eq!(catalog.default_channels().get("nginx"), Some(&"stable"));
}

#[test]
fn test_channel_head_of_default_channel() {
    let dir = catalog_dir();
    let catalog = read_catalog(dir.path()).unwrap();
    let filter = CatalogFilter::new(&catalog);

    let selected = filter
        .filter(&include(vec![IncludePackage::new("etcd")]), false)
        .unwrap();

    // 1.0.0-rc1 sorts above 0.9.4 and is the head of stable
    assert_eq!(selected.keys().collect::<Vec<_>>(), vec!["etcd.v1.0.0-rc1"]);
    let images = &selected["etcd.v1.0.0-rc1"];
    assert_eq!(images[0].image_type, ImageType::OperatorBundle);
    // the bundle listed again as a related image is not duplicated
    assert_eq!(images.len(), 2);
    assert_eq!(images[1].image_type, ImageType::OperatorRelatedImage);
}

#[test]
fn test_version_range_on_default_channel() {
    let dir = catalog_dir();
    let catalog = read_catalog(dir.path()).unwrap();
    let filter = CatalogFilter::new(&catalog);

    let package = IncludePackage {
        min_version: Some("0.9.2".to_string()),
        max_version: Some("0.9.4".to_string()),
        ..IncludePackage::new("etcd")
    };
    let selected = filter.filter(&include(vec![package]), false).unwrap();

    assert_eq!(
        selected.keys().collect::<Vec<_>>(),
        vec!["etcd.v0.9.2", "etcd.v0.9.4"]
    );
}

#[test]
fn test_explicit_channel_with_bounds() {
    let dir = catalog_dir();
    let catalog = read_catalog(dir.path()).unwrap();
    let filter = CatalogFilter::new(&catalog);

    let package = IncludePackage {
        channels: vec![
            IncludeChannel {
                min_version: Some("v0.9.4".to_string()),
                ..IncludeChannel::new("stable")
            },
            IncludeChannel::new("alpha"),
            IncludeChannel::new("missing"),
        ],
        ..IncludePackage::new("etcd")
    };
    let selected = filter.filter(&include(vec![package]), false).unwrap();

    assert_eq!(
        selected.keys().collect::<Vec<_>>(),
        vec!["etcd.v0.9.4", "etcd.v1.0.0", "etcd.v1.0.0-rc1"]
    );
}

#[test]
fn test_full_takes_every_bundle() {
    let dir = catalog_dir();
    let catalog = read_catalog(dir.path()).unwrap();
    let filter = CatalogFilter::new(&catalog);

    let selected = filter
        .filter(&include(vec![IncludePackage::new("etcd")]), true)
        .unwrap();
    assert_eq!(selected.len(), 5);
}

#[test]
fn test_empty_package_list_selects_all_packages() {
    let dir = catalog_dir();
    let catalog = read_catalog(dir.path()).unwrap();
    let filter = CatalogFilter::new(&catalog);

    let selected = filter.filter(&IncludeConfig::default(), false).unwrap();
    assert_eq!(
        selected.keys().collect::<Vec<_>>(),
        vec!["etcd.v1.0.0-rc1", "nginx.v2.2.0"]
    );

    // oci:// related images are left out
    let nginx: Vec<_> = selected["nginx.v2.2.0"].iter().map(|i| i.image.as_str()).collect();
    assert_eq!(nginx.len(), 2);
    assert!(nginx.contains(&"docker.io/library/nginx:1.25"));
}

#[test]
fn test_unknown_package_is_skipped() {
    let dir = catalog_dir();
    let catalog = read_catalog(dir.path()).unwrap();
    let filter = CatalogFilter::new(&catalog);

    let selected = filter
        .filter(
            &include(vec![IncludePackage::new("missing"), IncludePackage::new("nginx")]),
            false,
        )
        .unwrap();
    assert_eq!(selected.keys().collect::<Vec<_>>(), vec!["nginx.v2.2.0"]);
}

#[test]
fn test_malformed_package_bound_does_not_stop_other_packages() {
    let dir = catalog_dir();
    let catalog = read_catalog(dir.path()).unwrap();
    let filter = CatalogFilter::new(&catalog);

    let etcd = IncludePackage {
        min_version: Some("not-a-version".to_string()),
        ..IncludePackage::new("etcd")
    };
    let selected = filter
        .filter(&include(vec![etcd, IncludePackage::new("nginx")]), false)
        .unwrap();
    assert_eq!(selected.keys().collect::<Vec<_>>(), vec!["nginx.v2.2.0"]);
}

#[test]
fn test_channels_and_bounds_conflict() {
    let dir = catalog_dir();
    let catalog = read_catalog(dir.path()).unwrap();
    let filter = CatalogFilter::new(&catalog);

    let package = IncludePackage {
        channels: vec![IncludeChannel::new("stable")],
        min_version: Some("0.9.0".to_string()),
        ..IncludePackage::new("etcd")
    };
    let err = filter.filter(&include(vec![package]), false).unwrap_err();

    assert!(matches!(err, MirrorError::ConfigurationConflict(_)));
    assert!(err
        .to_string()
        .contains("cannot use channels/full and min/max versions at the same time"));
}

#[test]
fn test_full_and_bounds_conflict() {
    let dir = catalog_dir();
    let catalog = read_catalog(dir.path()).unwrap();
    let filter = CatalogFilter::new(&catalog);

    let package = IncludePackage {
        max_version: Some("1.0.0".to_string()),
        ..IncludePackage::new("etcd")
    };
    let err = filter.filter(&include(vec![package]), true).unwrap_err();
    assert!(err.is_fatal());
}

#[test]
fn test_malformed_catalog_file() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("broken.json"), r#"{"schema":"olm.package","name":"#).unwrap();

    let err = read_catalog(dir.path()).unwrap_err();
    assert!(matches!(err, MirrorError::Catalog(_)));
}
