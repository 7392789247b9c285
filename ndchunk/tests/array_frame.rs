#![allow(missing_docs)]

use ndchunk::codec::CodecConfiguration;
use ndchunk::codec::frame::{FRAME_MAGIC, Frame};
use ndchunk::{Array, ArrayParams, ChunkedStorage, Context, ContextConfig, ErrorKind, Storage};

fn data() -> Vec<u32> {
    (0..9 * 10).collect()
}

#[test]
fn array_frame_round_trip() -> Result<(), Box<dyn std::error::Error>> {
    let context = Context::new(ContextConfig::default())?;
    let params = ArrayParams::new(4, [9, 10]);
    let storage = ChunkedStorage::new([4, 4], [2, 4]).into();
    let array = Array::from_elements(&context, &params, &storage, &data())?;
    let sframe = array.to_sframe()?;
    assert_eq!(&sframe[..8], FRAME_MAGIC);

    for copy in [false, true] {
        let array = Array::from_sframe(&context, sframe.clone(), copy)?;
        assert!(array.filled());
        assert_eq!(array.nchunks(), 9);
        assert_eq!(array.chunkshape().as_slice(), &[4, 4]);
        assert_eq!(array.blockshape().as_slice(), &[2, 4]);
        assert_eq!(array.codec_configuration(), Some(context.config().codec().clone()));
        assert_eq!(array.to_elements::<u32>()?, data());
    }
    Ok(())
}

#[test]
fn array_frame_keeps_its_codec() -> Result<(), Box<dyn std::error::Error>> {
    let gzip: CodecConfiguration = serde_json::from_str(r#"{"name":"gzip","level":6}"#)?;
    let gzip_context = Context::new(ContextConfig::default().with_codec(gzip.clone()))?;
    let bytes_context = Context::new(ContextConfig::default().with_codec(CodecConfiguration::Bytes))?;
    let array = Array::from_elements(
        &gzip_context,
        &ArrayParams::new(4, [9, 10]),
        &ChunkedStorage::new([3, 5], [3, 5]).into(),
        &data(),
    )?;
    let array = Array::from_sframe(&bytes_context, array.to_sframe()?, false)?;
    assert_eq!(array.codec_configuration(), Some(gzip));
    assert_eq!(array.to_elements::<u32>()?, data());
    Ok(())
}

#[test]
fn array_filename_storage() -> Result<(), Box<dyn std::error::Error>> {
    let context = Context::new(ContextConfig::default())?;
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("array.ndchunk");
    let params = ArrayParams::new(4, [9, 10]);
    let storage = ChunkedStorage::new([5, 5], [5, 5]).with_filename(&path).into();

    let mut array = Array::empty(&context, &params, &storage)?;
    assert!(!path.exists());
    let elements = data();
    for origin in [[0, 0], [0, 5], [5, 0], [5, 5]] {
        let chunk: Vec<u32> = (0..25)
            .map(|i| {
                let (row, col) = (origin[0] + i / 5, origin[1] + i % 5);
                if row < 9 { elements[row * 10 + col] } else { 0 }
            })
            .collect();
        array.append_elements(&chunk)?;
    }
    assert!(array.filled());
    assert!(path.exists());
    assert_eq!(array.to_elements::<u32>()?, elements);
    drop(array);

    let frame = Frame::open(&path)?;
    assert!(!frame.is_in_memory());
    assert_eq!(frame.chunk_count(), 4);

    for copy in [false, true] {
        let array = Array::from_file(&context, &path, copy)?;
        assert!(array.filled());
        assert_eq!(array.shape().as_slice(), &[9, 10]);
        assert_eq!(array.to_elements::<u32>()?, elements);
        let slice = array.slice(&[4, 3], &[6, 7], &Storage::PlainBuffer)?;
        assert_eq!(
            slice.to_elements::<u32>()?,
            vec![43, 44, 45, 46, 53, 54, 55, 56]
        );
    }
    Ok(())
}

#[test]
fn array_filename_storage_write_failure() -> Result<(), Box<dyn std::error::Error>> {
    let context = Context::new(ContextConfig::default())?;
    let dir = tempfile::tempdir()?;
    let subdir = dir.path().join("missing");
    let path = subdir.join("array.ndchunk");
    let storage = ChunkedStorage::new([5], [5]).with_filename(&path).into();
    let mut array = Array::empty(&context, &ArrayParams::new(4, [10]), &storage)?;
    let elements: Vec<u32> = (0..10).collect();
    array.append_elements(&elements[..5])?;

    let err = array.append_elements(&elements[5..]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Frame);
    assert_eq!(array.nparts(), 1);
    assert!(!array.filled());
    assert!(!path.exists());

    std::fs::create_dir(&subdir)?;
    array.append_elements(&elements[5..])?;
    assert_eq!(array.nparts(), 2);
    assert!(array.filled());
    assert!(path.exists());
    assert_eq!(array.to_elements::<u32>()?, elements);
    assert_eq!(
        Array::from_file(&context, &path, false)?.to_elements::<u32>()?,
        elements
    );
    Ok(())
}

#[test]
fn array_enforce_frame() -> Result<(), Box<dyn std::error::Error>> {
    let context = Context::new(ContextConfig::default())?;
    let storage = ChunkedStorage::new([4, 4], [4, 4])
        .with_enforce_frame(true)
        .into();
    let array = Array::from_elements(&context, &ArrayParams::new(4, [9, 10]), &storage, &data())?;
    assert!(array.filled());
    assert_eq!(array.to_elements::<u32>()?, data());

    let copy = Array::from_sframe(&context, array.to_sframe()?, true)?;
    assert_eq!(copy.to_elements::<u32>()?, data());
    Ok(())
}

#[test]
fn array_save() -> Result<(), Box<dyn std::error::Error>> {
    let context = Context::new(ContextConfig::default())?;
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("saved.ndchunk");
    let array = Array::from_elements(
        &context,
        &ArrayParams::new(4, [9, 10]),
        &ChunkedStorage::new([2, 10], [2, 10]).into(),
        &data(),
    )?;
    array.save(&path)?;
    assert_eq!(std::fs::read(&path)?, array.to_sframe()?);
    let loaded = Array::from_file(&context, &path, true)?;
    assert_eq!(loaded.nparts(), 5);
    assert_eq!(loaded.to_elements::<u32>()?, data());

    let plain = Array::from_elements(
        &context,
        &ArrayParams::new(4, [9, 10]),
        &Storage::PlainBuffer,
        &data(),
    )?;
    assert_eq!(
        plain.save(dir.path().join("plain.ndchunk")).unwrap_err().kind(),
        ErrorKind::InvalidStorage
    );
    Ok(())
}

#[test]
fn array_frame_invalid() -> Result<(), Box<dyn std::error::Error>> {
    let context = Context::new(ContextConfig::default())?;
    let array = Array::from_elements(
        &context,
        &ArrayParams::new(4, [9, 10]),
        &ChunkedStorage::new([4, 4], [4, 4]).into(),
        &data(),
    )?;
    let sframe = array.to_sframe()?;

    let mut corrupted = sframe.clone();
    corrupted[0] = b'X';
    assert_eq!(
        Array::from_sframe(&context, corrupted, false)
            .unwrap_err()
            .kind(),
        ErrorKind::Frame
    );
    assert_eq!(
        Array::from_sframe(&context, sframe[..sframe.len() - 1].to_vec(), false)
            .unwrap_err()
            .kind(),
        ErrorKind::Frame
    );
    assert_eq!(
        Array::from_file(&context, "missing.ndchunk", false)
            .unwrap_err()
            .kind(),
        ErrorKind::Frame
    );
    Ok(())
}
