use overlens_camera::{ChromaLayout, CropRect, FrameSource, SyntheticCamera};
use overlens_preprocess::{
    frame_to_nv21, nv21_len, nv21_to_rgb, Normalization, Preprocessor, TensorLayout,
};

#[test]
fn cpu_smoke() {
    let mut cam = SyntheticCamera::new(640, 480, 0).unwrap();
    let frame = cam.next_frame_blocking().unwrap();

    let pp = Preprocessor::new(224, 224);
    let out = pp.run(&frame).unwrap();
    assert_eq!(out.shape(), &[1, 224, 224, 3]);
    assert!(out.iter().all(|v| (-1.0..=1.0).contains(v)));

    let hwc = pp.run_hwc(&frame).unwrap();
    assert_eq!(hwc.shape(), &[224, 224, 3]);
}

#[test]
fn nchw_layout_puts_channels_first() {
    let mut cam = SyntheticCamera::new(64, 48, 0).unwrap();
    let frame = cam.next_frame_blocking().unwrap();

    let pp = Preprocessor::new(32, 16)
        .with_layout(TensorLayout::Nchw)
        .with_normalization(Normalization::unit());
    let out = pp.run(&frame).unwrap();
    assert_eq!(out.shape(), &[1, 3, 16, 32]);
    assert!(out.iter().all(|v| (0.0..=1.0).contains(v)));
}

#[test]
fn padded_semi_planar_and_packed_planar_agree() {
    let mut padded = SyntheticCamera::new(20, 10, 0)
        .unwrap()
        .with_layout(ChromaLayout::SemiPlanar)
        .with_row_padding(12);
    let mut packed = SyntheticCamera::new(20, 10, 0)
        .unwrap()
        .with_layout(ChromaLayout::Planar);

    let a = frame_to_nv21(&padded.next_frame_blocking().unwrap()).unwrap();
    let b = frame_to_nv21(&packed.next_frame_blocking().unwrap()).unwrap();
    assert_eq!(a, b);
    assert_eq!(a.len(), nv21_len(20, 10));
}

#[test]
fn frame_crop_and_rotation_shape_the_rgb_image() {
    let mut cam = SyntheticCamera::new(40, 30, 0)
        .unwrap()
        .with_crop(CropRect::new(4, 2, 36, 26))
        .unwrap()
        .with_rotation(90)
        .unwrap();
    let frame = cam.next_frame_blocking().unwrap();

    let nv21 = frame_to_nv21(&frame).unwrap();
    assert_eq!((nv21.width, nv21.height), (32, 24));
    assert_eq!(nv21_to_rgb(&nv21).unwrap().dimensions(), (32, 24));

    let upright = Preprocessor::new(8, 8).frame_to_rgb(&frame).unwrap();
    assert_eq!(upright.dimensions(), (24, 32));
    assert_eq!(upright.dimensions(), frame.upright_size());
}
