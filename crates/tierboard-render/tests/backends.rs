use tierboard_core::{
    BoardLayout, Document, Game, NodeId, Ranking, RankingMode, Rect, Stylesheet, render_board,
};
use tierboard_render::{
    BackendError, ExclusionFilter, ExportPayload, ImageFormat, RasterBackend, RenderSettings,
    SerializeBackend, SnapshotBackend, placeholder_data_uri,
};
use url::Url;

fn board(mode: RankingMode) -> (Document, NodeId) {
    let mut ranking = Ranking::new(mode);
    for (id, name) in [
        ("g1", "Minecraft"),
        ("g2", "100% Orange Juice"),
        ("g3", "Ratchet & Clank"),
    ] {
        ranking.push(Game::new(id, name), Some("t2"));
    }
    let mut doc = Document::new(Url::parse("http://localhost:3000/").unwrap());
    let root = render_board(&ranking, &mut doc, &BoardLayout::default());
    for img in doc.images(root) {
        doc.set_attr(img, "src", placeholder_data_uri());
    }
    (doc, root)
}

fn plain_doc() -> (Document, NodeId) {
    let mut doc = Document::new(Url::parse("http://localhost:3000/").unwrap());
    doc.set_stylesheet(Stylesheet::parse(
        ".card { background-color: #1f2937; border: 1px solid #333333; border-radius: 4px; }",
    ));
    let body = doc.body();
    let root = doc.create_element("div");
    doc.set_attr(root, "class", "card");
    doc.set_rect(root, Rect::new(10.0, 20.0, 40.0, 30.0));
    doc.append_child(body, root);
    let img = doc.create_element("img");
    doc.set_attr(img, "src", placeholder_data_uri());
    doc.set_rect(img, Rect::new(12.0, 22.0, 16.0, 16.0));
    doc.append_child(root, img);
    (doc, root)
}

fn svg_settings() -> RenderSettings {
    RenderSettings {
        format: ImageFormat::Svg,
        background: Some("#000000".to_string()),
        ..Default::default()
    }
}

fn svg_markup(payload: ExportPayload) -> String {
    match payload {
        ExportPayload::Text { markup, mime } => {
            assert_eq!(mime, "image/svg+xml");
            markup
        }
        other => panic!("expected markup, got {other:?}"),
    }
}

#[test]
fn serialized_svg_omits_export_hidden_chrome() {
    let (mut doc, root) = board(RankingMode::Tier);
    doc.add_class(root, "exporting");
    let markup = svg_markup(
        SerializeBackend
            .render(&doc, root, &svg_settings())
            .unwrap(),
    );

    let xml = roxmltree::Document::parse(&markup).unwrap();
    assert!(
        xml.descendants()
            .filter_map(|n| n.attribute("class"))
            .all(|c| !c.split_whitespace().any(|c| c == "export-hidden"))
    );
    let images = xml
        .descendants()
        .filter(|n| n.has_tag_name("image"))
        .count();
    assert_eq!(images, 3);
    let texts: Vec<&str> = xml
        .descendants()
        .filter(|n| n.has_tag_name("text"))
        .filter_map(|n| n.text())
        .collect();
    assert!(texts.contains(&"Ratchet & Clank"));
    assert!(texts.contains(&"T1"));
    assert!(!texts.contains(&"+"));
    assert!(!markup.contains("oklch"));
}

#[test]
fn exclusion_applies_even_without_export_mode_class() {
    let (doc, root) = board(RankingMode::Top);
    let markup = svg_markup(
        SerializeBackend
            .render(&doc, root, &svg_settings())
            .unwrap(),
    );
    assert!(!markup.contains("add-game-button"));
    assert!(!markup.contains("remove-button"));
}

#[test]
fn caller_predicate_excludes_elements() {
    let (doc, root) = board(RankingMode::Top);
    let settings = RenderSettings {
        filter: ExclusionFilter::default().with_predicate(|doc, n| doc.tag(n) == Some("img")),
        ..svg_settings()
    };
    let markup = svg_markup(SerializeBackend.render(&doc, root, &settings).unwrap());
    assert!(!markup.contains("<image"));
}

#[test]
fn serialize_rasterizes_at_pixel_ratio() {
    let (doc, root) = plain_doc();
    let settings = RenderSettings {
        format: ImageFormat::Png,
        pixel_ratio: 2.0,
        ..svg_settings()
    };
    let ExportPayload::Blob { bytes, mime } = SerializeBackend.render(&doc, root, &settings).unwrap()
    else {
        panic!("expected bytes");
    };
    assert_eq!(mime, "image/png");
    let img = image::load_from_memory(&bytes).unwrap();
    assert_eq!((img.width(), img.height()), (80, 60));
}

#[test]
fn snapshot_paints_legacy_colors() {
    let (doc, root) = plain_doc();
    let settings = RenderSettings {
        format: ImageFormat::Png,
        pixel_ratio: 2.0,
        background: Some("#000000".to_string()),
        ..Default::default()
    };
    let ExportPayload::Blob { bytes, .. } = SnapshotBackend.render(&doc, root, &settings).unwrap()
    else {
        panic!("expected bytes");
    };
    let img = image::load_from_memory(&bytes).unwrap().to_rgba8();
    assert_eq!(img.dimensions(), (80, 60));
    // Inside the card, away from the border and the image.
    assert_eq!(img.get_pixel(70, 50).0, [0x1f, 0x29, 0x37, 255]);
}

#[test]
fn snapshot_writes_jpeg() {
    let (doc, root) = plain_doc();
    let settings = RenderSettings {
        format: ImageFormat::Jpeg,
        quality: 0.8,
        ..Default::default()
    };
    let ExportPayload::Blob { bytes, mime } = SnapshotBackend.render(&doc, root, &settings).unwrap()
    else {
        panic!("expected bytes");
    };
    assert_eq!(mime, "image/jpeg");
    assert!(bytes.starts_with(&[0xff, 0xd8]));
}

#[test]
fn snapshot_rejects_wide_gamut_colors() {
    let (doc, root) = board(RankingMode::Tier);
    let err = SnapshotBackend
        .render(&doc, root, &RenderSettings::default())
        .unwrap_err();
    assert!(matches!(err, BackendError::Color { .. }), "{err}");
}

#[test]
fn snapshot_cannot_produce_svg() {
    let (doc, root) = plain_doc();
    assert!(matches!(
        SnapshotBackend.render(&doc, root, &svg_settings()),
        Err(BackendError::Unsupported { .. })
    ));
}

#[test]
fn zero_sized_target_is_rejected() {
    let (mut doc, root) = plain_doc();
    doc.set_rect(root, Rect::default());
    assert!(matches!(
        SerializeBackend.render(&doc, root, &svg_settings()),
        Err(BackendError::EmptyTarget)
    ));
}
