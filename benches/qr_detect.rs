use criterion::{Criterion, black_box, criterion_group, criterion_main};
use qr_sentinel::detector::FinderDetector;
use qr_sentinel::encoder::{encode_text, render_rgba};
use qr_sentinel::utils::binarization::otsu_binarize;
use qr_sentinel::utils::grayscale::rgba_to_grayscale;
use qr_sentinel::{ECLevel, FrameBuffer, decode, detect};

/// Symbol rendered at `scale` and centered on a `width` x `height` light canvas
fn frame_with_symbol(text: &str, scale: usize, width: usize, height: usize) -> FrameBuffer {
    let symbol = encode_text(text, ECLevel::M).expect("encode");
    let code = render_rgba(&symbol, scale, 4).expect("render");
    let left = (width - code.width()) / 2;
    let top = (height - code.height()) / 2;

    let mut data = vec![255u8; width * height * FrameBuffer::CHANNELS];
    let row = code.width() * FrameBuffer::CHANNELS;
    for y in 0..code.height() {
        let dst = ((top + y) * width + left) * FrameBuffer::CHANNELS;
        data[dst..dst + row].copy_from_slice(&code.data()[y * row..(y + 1) * row]);
    }
    FrameBuffer::new(width, height, data).expect("frame")
}

fn bench_decode_rendered(c: &mut Criterion) {
    let small = frame_with_symbol("https://example.com", 3, 200, 200);
    c.bench_function("decode_v2_200x200", |b| b.iter(|| decode(black_box(&small))));

    let vga = frame_with_symbol("https://example.com/menu?table=12", 6, 640, 480);
    c.bench_function("decode_640x480", |b| b.iter(|| decode(black_box(&vga))));

    let text = "https://example.com/".to_string() + &"a".repeat(180);
    let hd = frame_with_symbol(&text, 8, 1920, 1080);
    c.bench_function("decode_v8_1920x1080", |b| b.iter(|| decode(black_box(&hd))));
}

fn bench_no_symbol(c: &mut Criterion) {
    let blank = FrameBuffer::from_luma(640, 480, &vec![128u8; 640 * 480]).expect("frame");
    c.bench_function("detect_blank_640x480", |b| b.iter(|| detect(black_box(&blank))));
}

fn bench_finder_scan(c: &mut Criterion) {
    let frame = frame_with_symbol("FINDERS", 6, 640, 480);
    let gray = rgba_to_grayscale(frame.data(), frame.width(), frame.height());
    let binary = otsu_binarize(&gray, frame.width(), frame.height());

    c.bench_function("finder_scan_640x480", |b| {
        b.iter(|| FinderDetector::detect(black_box(&binary)))
    });
}

criterion_group!(benches, bench_decode_rendered, bench_no_symbol, bench_finder_scan);
criterion_main!(benches);
