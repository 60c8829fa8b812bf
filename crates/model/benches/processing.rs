use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use image::{Rgb, RgbImage};
use model::{
    OutputLayout, Params,
    processing::{
        post::PostProcessor,
        pre::{LetterboxTransform, PreProcessor},
    },
};
use ndarray::{Array, ArrayD, IxDyn};

/// Create a YOLOv8-shaped head `[1, 84, 8400]` with N confident,
/// partially overlapping boxes.
fn create_mock_yolo_output(num_detections: usize) -> ArrayD<f32> {
    let anchors = 8400;
    let channels = 84;
    let mut data = vec![0.0f32; channels * anchors];

    for i in 0..num_detections.min(anchors) {
        data[i] = 40.0 + (i % 20) as f32 * 28.0;
        data[anchors + i] = 40.0 + (i / 20) as f32 * 28.0;
        data[2 * anchors + i] = 48.0;
        data[3 * anchors + i] = 48.0;
        data[(4 + i % 80) * anchors + i] = 0.9;
    }

    Array::from_shape_vec(IxDyn(&[1, channels, anchors]), data).unwrap()
}

fn benchmark_preprocessing(c: &mut Criterion) {
    let mut group = c.benchmark_group("preprocessing");

    // Test different resolutions
    let resolutions = [(640, 480), (1280, 720), (1920, 1080)];

    for (width, height) in resolutions.iter() {
        let image = RgbImage::from_pixel(*width, *height, Rgb([128, 128, 128]));
        let mut preprocessor = PreProcessor::new((640, 640), OutputLayout::Yolo);

        group.bench_with_input(
            BenchmarkId::new("letterbox", format!("{}x{}", width, height)),
            &image,
            |b, image| {
                b.iter(|| preprocessor.preprocess(black_box(image)).unwrap());
            },
        );
    }

    group.finish();
}

fn benchmark_postprocessing(c: &mut Criterion) {
    let mut group = c.benchmark_group("postprocessing");
    let post_processor = PostProcessor::new(&Params::default());

    let transform = LetterboxTransform {
        orig_width: 1920,
        orig_height: 1080,
        input_width: 640,
        input_height: 640,
        scale: 1.0 / 3.0,
        offset_x: 0.0,
        offset_y: 140.0,
    };

    let detection_counts = [0, 5, 50, 300];

    for num_detections in detection_counts.iter() {
        let preds = create_mock_yolo_output(*num_detections);

        group.bench_with_input(
            BenchmarkId::new("parse_yolo", num_detections),
            &preds,
            |b, preds| {
                b.iter(|| {
                    post_processor
                        .parse_yolo(black_box(&preds.view()), black_box(&transform))
                        .unwrap()
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, benchmark_preprocessing, benchmark_postprocessing);
criterion_main!(benches);
