use khmer_ocr::core::boxes::{parse_annotations, resolve_boxes};
use khmer_ocr::core::pipeline::prepare_page;
use khmer_ocr::core::report::{DetectionReport, ExtractionReport};
use khmer_ocr::core::{BoxCoords, Detection, RegionSource, Storage};
use khmer_ocr::domain::model::{BoundingBox, DetectedRegion};
use khmer_ocr::LocalStorage;
use tempfile::TempDir;

fn region(detection_id: usize, coords: BoxCoords) -> DetectedRegion {
    DetectedRegion {
        detection_id,
        bounding_box: BoundingBox::from(coords),
        confidence: 0.87,
        class_id: 0,
        class_name: Some("text".to_string()),
    }
}

#[test]
fn test_reports_round_trip_through_local_storage() {
    let dir = TempDir::new().unwrap();
    let storage = LocalStorage::new(dir.path().join("run"));

    let detections = vec![
        Detection {
            box_coordinates: BoxCoords::new(0, 0, 50, 20),
            extracted_text: "ព្រះរាជាណាចក្រកម្ពុជា".to_string(),
            cropped_image_base64: String::new(),
        },
        Detection {
            box_coordinates: BoxCoords::new(0, 30, 50, 50),
            extracted_text: String::new(),
            cropped_image_base64: String::new(),
        },
    ];
    let extraction = ExtractionReport {
        source_image: "scan.jpg".to_string(),
        engine: "tesseract".to_string(),
        model_used: None,
        prompt: None,
        extracted_text: ExtractionReport::joined_text(&detections),
        detections_processed: detections.len(),
        detections,
    };
    let detection = DetectionReport {
        image_path: "scan.jpg".to_string(),
        model_path: Some("models/khmer-text.onnx".to_string()),
        confidence_threshold: 0.25,
        detections: vec![region(0, BoxCoords::new(0, 0, 50, 20))],
    };

    tokio_test::block_on(async {
        storage
            .write_file("extraction.json", &serde_json::to_vec_pretty(&extraction).unwrap())
            .await
            .unwrap();
        storage
            .write_file("detections.json", &serde_json::to_vec(&detection).unwrap())
            .await
            .unwrap();
        storage
            .write_file("extraction.txt", extraction.render_text().as_bytes())
            .await
            .unwrap();

        let json: serde_json::Value =
            serde_json::from_slice(&storage.read_file("extraction.json").await.unwrap()).unwrap();
        assert_eq!(json["detections_processed"], 2);
        assert_eq!(json["extracted_text"], "ព្រះរាជាណាចក្រកម្ពុជា");
        assert_eq!(json["detections"][1]["box_coordinates"], serde_json::json!([0, 30, 50, 50]));

        let json: serde_json::Value =
            serde_json::from_slice(&storage.read_file("detections.json").await.unwrap()).unwrap();
        assert_eq!(json["detections"][0]["bounding_box"]["width"], 50);
        assert_eq!(json["detections"][0]["class_name"], "text");

        let text = String::from_utf8(storage.read_file("extraction.txt").await.unwrap()).unwrap();
        assert!(text.contains("Total detections: 2"));
    });
}

#[test]
fn test_boxes_file_feeds_page_preparation() {
    let page = image::RgbImage::from_pixel(64, 48, image::Rgb([250, 250, 250]));
    let mut png = Vec::new();
    image::DynamicImage::ImageRgb8(page)
        .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
        .unwrap();

    let entries = parse_annotations(r#"[["4", "4", "30.7", "20"], [100, 100, 200, 200]]"#).unwrap();
    assert_eq!(resolve_boxes(&entries, 64, 48), vec![BoxCoords::new(4, 4, 30, 20)]);

    let prepared = prepare_page(&png, &RegionSource::User(entries), None, true).unwrap();
    assert_eq!(prepared.regions.len(), 1);
    assert_eq!(prepared.regions[0].ocr_input.width(), 26);
    assert_eq!(prepared.regions[0].ocr_input.height(), 16);
}
