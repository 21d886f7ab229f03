use super::*;

#[test]
fn stencil_rejects_short_rows() {
    assert!(Stencil::new(9, 2, false, vec![0; 3]).is_err());
    assert!(Stencil::new(9, 2, false, vec![0; 4]).is_ok());
}

#[test]
fn stencil_marked_msb_first() {
    // 9 px wide, two bytes per row
    let s = Stencil::new(9, 2, false, vec![0b0111_1111, 0xff, 0xff, 0b0111_1111]).unwrap();
    assert!(s.marked(0, 0));
    assert!(!s.marked(1, 0));
    assert!(!s.marked(8, 0));
    assert!(!s.marked(0, 1));
    assert!(s.marked(8, 1));
}

#[test]
fn stencil_invert() {
    let s = Stencil::new(2, 1, true, vec![0b1000_0000]).unwrap();
    assert!(s.marked(0, 0));
    assert!(!s.marked(1, 0));
}

#[test]
fn image_dimensions() {
    let img = Image {
        kind: ImageKind::Stencil(Stencil::new(3, 2, false, vec![0, 0]).unwrap()),
        interpolate: false,
    };
    assert_eq!(img.width(), 3);
    assert_eq!(img.height(), 2);

    let img = Image {
        kind: ImageKind::Rgba(RgbaImage::new(4, 5)),
        interpolate: true,
    };
    assert_eq!(img.width(), 4);
    assert_eq!(img.height(), 5);
}
