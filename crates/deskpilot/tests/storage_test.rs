use deskpilot::{
    AutomationError, ControlDescriptor, ImageTemplate, ResourceKind, ResourceLibrary, ResourceStore,
    TemplateStore,
};
use image::{Rgba, RgbaImage};

#[test]
fn resource_library_round_trips_through_disk() {
    let dir = tempfile::tempdir().unwrap();
    let store = ResourceStore::new(dir.path());

    let descriptor = ControlDescriptor {
        window_title: Some("千牛工作台".into()),
        automation_id: Some("btnSubmit".into()),
        control_id: Some(1001),
        control_type: Some("Button".into()),
        name: Some("提交".into()),
        ..Default::default()
    };

    let mut library = ResourceLibrary::new("qianniu");
    let submit = library
        .create_control("submit-btn", descriptor.clone())
        .unwrap()
        .clone();
    let logo = library
        .create_image("logo", ImageTemplate::new("logo.png"))
        .unwrap()
        .clone();
    store.save("qianniu", &library).unwrap();

    let reloaded = store.load("qianniu").unwrap();
    let item = reloaded.control(&submit.id).unwrap();
    assert_eq!(item.id, submit.id);
    assert_eq!(item.name, "submit-btn");
    assert_eq!(item.payload, descriptor);
    assert_eq!(item.created_at, submit.created_at);
    assert_eq!(reloaded, library);

    let mut edited = reloaded;
    assert!(edited.delete(ResourceKind::Control, &submit.id));
    store.save("qianniu", &edited).unwrap();

    let after = store.load("qianniu").unwrap();
    assert!(after.control(&submit.id).is_none());
    assert_eq!(after.image(&logo.id).map(|i| i.name.as_str()), Some("logo"));
}

#[test]
fn missing_library_loads_empty() {
    let dir = tempfile::tempdir().unwrap();
    let library = ResourceStore::new(dir.path()).load("new-app").unwrap();
    assert_eq!(library.platform, "new-app");
    assert!(library.controls.is_empty() && library.images.is_empty());
}

#[test]
fn corrupt_library_is_an_error_and_left_alone() {
    let dir = tempfile::tempdir().unwrap();
    let store = ResourceStore::new(dir.path());
    std::fs::write(store.path_for("app"), "[1, 2").unwrap();

    assert!(store.load("app").is_err());
    assert!(store
        .update("app", |lib| lib.create_image("x", ImageTemplate::new("x.png")).map(|_| ()))
        .is_err());
    assert_eq!(std::fs::read_to_string(store.path_for("app")).unwrap(), "[1, 2");
}

#[test]
fn stored_library_uses_rfc3339_timestamps() {
    let dir = tempfile::tempdir().unwrap();
    let store = ResourceStore::new(dir.path());
    store
        .update("app", |lib| lib.create_image("x", ImageTemplate::new("x.png")).map(|_| ()))
        .unwrap();

    let raw: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(store.path_for("app")).unwrap()).unwrap();
    let created = raw["images"][0]["created_at"].as_str().unwrap();
    assert!(chrono::DateTime::parse_from_rfc3339(created).is_ok(), "{created}");
}

#[test]
fn imported_template_is_copied_under_its_name() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("send-button.png");
    RgbaImage::from_pixel(24, 12, Rgba([200, 30, 30, 255]))
        .save(&source)
        .unwrap();
    let store = TemplateStore::new(dir.path().join("platforms").join("templates"));

    let name = store.import(&source, None).unwrap();
    assert_eq!(name, "send-button.png");
    let copied = image::open(store.dir().join(&name)).unwrap().to_rgba8();
    assert_eq!(copied.dimensions(), (24, 12));

    let renamed = store.import(&source, Some(" send.png ")).unwrap();
    assert_eq!(renamed, "send.png");
    assert!(store.dir().join("send.png").is_file());
}

#[test]
fn import_rejects_non_images_and_path_names() {
    let dir = tempfile::tempdir().unwrap();
    let store = TemplateStore::new(dir.path().join("templates"));
    let notes = dir.path().join("notes.png");
    std::fs::write(&notes, "not an image").unwrap();

    assert!(matches!(
        store.import(&notes, None).unwrap_err(),
        AutomationError::Image(_)
    ));
    assert!(!store.dir().join("notes.png").exists());

    let err = store.import(&notes, Some("../escape.png")).unwrap_err();
    assert!(matches!(err, AutomationError::InvalidName(_)), "{err:?}");
}
