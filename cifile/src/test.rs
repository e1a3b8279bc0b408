use super::*;

#[test]
fn write_read() {
    let path = "test.cib";

    let text = vec![0xfeca_feca_u32 as i32, 6, 0, 1, 42, 9];
    let data = vec![104, 105, 10, 0];

    let image_orig = Image::from(1, text, data);

    write_file(path, &image_orig).unwrap();

    let image_read = read_file(path).unwrap();

    assert_eq!(image_orig, image_read);

    std::fs::remove_file(path).unwrap();
}

#[test]
fn stream_round_trip_is_byte_identical() {
    let image = Image::from(3, vec![1, 2, -3], vec![7, 8]);

    let mut bytes = Vec::new();
    bytes.write_image(&image).unwrap();

    assert_eq!(bytes.len(), image.required_size());

    let restored = bytes.as_slice().read_image().unwrap();
    assert_eq!(restored.main_offset(), 3);
    assert_eq!(restored.text(), [1, 2, -3]);
    assert_eq!(restored.data(), [7, 8]);
}

#[test]
fn header_is_little_endian_ints() {
    let image = Image::from(1, vec![5], vec![9]);

    let mut bytes = Vec::new();
    bytes.write_image(&image).unwrap();

    assert_eq!(
        bytes,
        [1, 0, 0, 0, 4, 0, 0, 0, 1, 0, 0, 0, 5, 0, 0, 0, 9]
    );
}

#[test]
fn ragged_text_is_rejected() {
    // text_size of 5 bytes is not a whole number of words
    let bytes = [1, 0, 0, 0, 5, 0, 0, 0, 0, 0, 0, 0, 1, 2, 3, 4, 5];

    assert!(bytes.as_ref().read_image().is_err());
}
