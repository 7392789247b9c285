#![allow(missing_docs)]

use std::sync::Arc;

use ndchunk::codec::CodecConfiguration;
use ndchunk::{
    Array, ArrayParams, ChunkedStorage, Context, ContextConfig, ErrorKind, Storage,
};

/// The elements of `shape` inside `[start, stop)`, computed without the library.
fn expected_region(data: &[u16], shape: &[u64], start: &[u64], stop: &[u64]) -> Vec<u16> {
    let region: Vec<u64> = std::iter::zip(start, stop).map(|(a, b)| b - a).collect();
    let size: u64 = region.iter().product();
    (0..size)
        .map(|element| {
            let mut rem = element;
            let mut offset = 0;
            let mut stride = 1;
            for i in (0..shape.len()).rev() {
                offset += (start[i] + rem % region[i]) * stride;
                rem /= region[i];
                stride *= shape[i];
            }
            data[usize::try_from(offset).unwrap()]
        })
        .collect()
}

fn array_3d(
    context: &Arc<Context>,
    storage: &Storage,
) -> Result<(Array, Vec<u16>), Box<dyn std::error::Error>> {
    let data: Vec<u16> = (0..7 * 5 * 6).collect();
    let array = Array::from_elements(context, &ArrayParams::new(2, [7, 5, 6]), storage, &data)?;
    Ok((array, data))
}

fn storages() -> Vec<Storage> {
    vec![
        ChunkedStorage::new([3, 2, 4], [3, 2, 2]).into(),
        ChunkedStorage::new([7, 5, 6], [7, 5, 6]).into(),
        Storage::PlainBuffer,
    ]
}

#[test]
fn array_get_slice_buffer() -> Result<(), Box<dyn std::error::Error>> {
    let context = Context::new(ContextConfig::default())?;
    let shape = [7, 5, 6];
    let regions: [([u64; 3], [u64; 3]); 6] = [
        ([0, 0, 0], [7, 5, 6]),
        ([1, 2, 0], [3, 4, 3]),
        ([3, 1, 2], [7, 5, 6]),
        ([6, 4, 5], [7, 5, 6]),
        ([2, 0, 1], [2, 5, 6]),
        ([0, 3, 3], [5, 4, 4]),
    ];
    for storage in storages() {
        let (array, data) = array_3d(&context, &storage)?;
        for (start, stop) in regions {
            let region: Vec<u64> = std::iter::zip(start, stop).map(|(a, b)| b - a).collect();
            let size: u64 = region.iter().product();
            let mut buffer = vec![0u16; usize::try_from(size)?];
            array.get_slice_buffer(
                &start,
                &stop,
                &region,
                bytemuck::cast_slice_mut(&mut buffer),
            )?;
            assert_eq!(
                buffer,
                expected_region(&data, &shape, &start, &stop),
                "{start:?}..{stop:?}"
            );
        }
    }
    Ok(())
}

#[test]
fn array_get_slice_buffer_larger_destination() -> Result<(), Box<dyn std::error::Error>> {
    let context = Context::new(ContextConfig::default())?;
    for storage in storages() {
        let (array, data) = array_3d(&context, &storage)?;
        let mut buffer = vec![u16::MAX; 3 * 3 * 4];
        array.get_slice_buffer(
            &[1, 1, 1],
            &[3, 3, 4],
            &[3, 3, 4],
            bytemuck::cast_slice_mut(&mut buffer),
        )?;
        let expected = expected_region(&data, &[7, 5, 6], &[1, 1, 1], &[3, 3, 4]);
        for i in 0..2 {
            for j in 0..2 {
                let row = (i * 3 + j) * 4;
                assert_eq!(buffer[row..row + 3], expected[(i * 2 + j) * 3..][..3]);
                assert_eq!(buffer[row + 3], u16::MAX);
            }
        }
        assert!(buffer[24..].iter().all(|&value| value == u16::MAX));
    }
    Ok(())
}

#[test]
fn array_get_slice_buffer_invalid() -> Result<(), Box<dyn std::error::Error>> {
    let context = Context::new(ContextConfig::default())?;
    let (array, _) = array_3d(&context, &Storage::PlainBuffer)?;
    let mut buffer = vec![0u8; 8];
    let mut kind = |start: &[u64], stop: &[u64], dest_shape: &[u64]| {
        array
            .get_slice_buffer(start, stop, dest_shape, &mut buffer)
            .unwrap_err()
            .kind()
    };
    // out of bounds
    assert_eq!(kind(&[0, 0, 5], &[1, 2, 7], &[1, 2, 2]), ErrorKind::InvalidArgument);
    // start after stop
    assert_eq!(kind(&[1, 0, 0], &[0, 2, 2], &[1, 2, 2]), ErrorKind::InvalidArgument);
    // wrong rank
    assert_eq!(kind(&[0, 0], &[2, 2], &[2, 2]), ErrorKind::InvalidArgument);
    // destination smaller than the region
    assert_eq!(kind(&[0, 0, 0], &[1, 2, 2], &[1, 2, 1]), ErrorKind::InvalidArgument);
    // destination buffer too small
    assert_eq!(kind(&[0, 0, 0], &[1, 2, 3], &[1, 2, 3]), ErrorKind::InvalidArgument);
    Ok(())
}

#[test]
fn array_get_slice() -> Result<(), Box<dyn std::error::Error>> {
    let context = Context::new(ContextConfig::default())?;
    let (start, stop) = ([1, 0, 2], [6, 4, 6]);
    for src_storage in storages() {
        let (array, data) = array_3d(&context, &src_storage)?;
        let expected = expected_region(&data, &[7, 5, 6], &start, &stop);
        for dest_storage in [
            ChunkedStorage::new([2, 2, 2], [2, 2, 2]).into(),
            ChunkedStorage::new([5, 4, 4], [5, 2, 4]).into(),
            Storage::PlainBuffer,
        ] {
            let slice = array.slice(&start, &stop, &dest_storage)?;
            assert_eq!(slice.shape().as_slice(), &[5, 4, 4]);
            assert!(slice.filled());
            assert_eq!(slice.nparts(), slice.nchunks());
            assert_eq!(slice.to_elements::<u16>()?, expected);

            let params = ArrayParams::new(2, [5, 4, 4]);
            let mut dest = Array::empty(&context, &params, &dest_storage)?;
            array.get_slice(&mut dest, &start, &stop)?;
            assert_eq!(dest.to_elements::<u16>()?, expected);
            assert_eq!(
                array.get_slice(&mut dest, &start, &stop).unwrap_err().kind(),
                ErrorKind::ContainerFilled
            );
        }
    }
    Ok(())
}

#[test]
fn array_get_slice_partial_chunks_only() -> Result<(), Box<dyn std::error::Error>> {
    let context = Context::new(ContextConfig::default().with_codec(CodecConfiguration::Bytes))?;
    let mut array = Array::empty(
        &context,
        &ArrayParams::new(1, [4, 4]),
        &ChunkedStorage::new([2, 2], [2, 2]).into(),
    )?;
    array.append(&[0, 1, 4, 5])?;
    let slice = array.slice(&[0, 0], &[2, 2], &Storage::PlainBuffer)?;
    assert_eq!(slice.to_vec()?, vec![0, 1, 4, 5]);
    assert_eq!(
        array
            .slice(&[0, 0], &[2, 3], &Storage::PlainBuffer)
            .unwrap_err()
            .kind(),
        ErrorKind::InvalidArgument
    );
    Ok(())
}

#[test]
fn array_set_slice_buffer() -> Result<(), Box<dyn std::error::Error>> {
    let context = Context::new(ContextConfig::default())?;
    let (mut array, mut data) = array_3d(&context, &Storage::PlainBuffer)?;
    let values = vec![9999u16; 2 * 2 * 3];
    array.set_slice_buffer(&[2, 1, 3], &[4, 3, 6], bytemuck::cast_slice(&values))?;
    for i in 2..4 {
        for j in 1..3 {
            for k in 3..6 {
                data[i * 30 + j * 6 + k] = 9999;
            }
        }
    }
    assert_eq!(array.to_elements::<u16>()?, data);
    assert_eq!(
        array
            .set_slice_buffer(&[0, 0, 0], &[1, 1, 1], &[0; 4])
            .unwrap_err()
            .kind(),
        ErrorKind::InvalidArgument
    );

    let (mut chunked, _) = array_3d(&context, &storages()[0])?;
    assert_eq!(
        chunked
            .set_slice_buffer(&[0, 0, 0], &[1, 1, 1], &[0; 2])
            .unwrap_err()
            .kind(),
        ErrorKind::InvalidStorage
    );
    Ok(())
}

#[test]
fn array_get_slice_buffer_no_copy() -> Result<(), Box<dyn std::error::Error>> {
    let context = Context::new(ContextConfig::default())?;
    let (array, data) = array_3d(&context, &Storage::PlainBuffer)?;
    let bytes = array.get_slice_buffer_no_copy(&[2, 0, 0], &[4, 5, 6])?;
    assert_eq!(bytes, bytemuck::cast_slice::<u16, u8>(&data[60..120]));
    let bytes = array.get_slice_buffer_no_copy(&[3, 2, 1], &[4, 3, 5])?;
    assert_eq!(bytes, bytemuck::cast_slice::<u16, u8>(&data[103..107]));
    assert_eq!(
        array
            .get_slice_buffer_no_copy(&[0, 0, 0], &[2, 2, 6])
            .unwrap_err()
            .kind(),
        ErrorKind::InvalidArgument
    );

    let (chunked, _) = array_3d(&context, &storages()[0])?;
    assert_eq!(
        chunked
            .get_slice_buffer_no_copy(&[0, 0, 0], &[1, 1, 1])
            .unwrap_err()
            .kind(),
        ErrorKind::InvalidStorage
    );
    Ok(())
}

#[test]
fn array_get_slice_buffer_no_copy_offsets() -> Result<(), Box<dyn std::error::Error>> {
    let context = Context::new(ContextConfig::default())?;
    let data: Vec<u16> = (0..5 * 6 * 3).collect();
    let array = Array::from_elements(
        &context,
        &ArrayParams::new(2, [5, 6, 3]),
        &Storage::PlainBuffer,
        &data,
    )?;
    let itemsize = 2;
    let full = array.get_slice_buffer_no_copy(&[0, 0, 0], &[5, 6, 3])?;
    assert_eq!(full, bytemuck::cast_slice::<u16, u8>(&data));
    let base = full.as_ptr();
    assert_eq!(
        array.get_slice_buffer_no_copy(&[0, 0, 0], &[5, 6, 3])?.as_ptr(),
        base
    );
    let rows = array.get_slice_buffer_no_copy(&[2, 0, 0], &[5, 6, 3])?;
    assert_eq!(rows.as_ptr(), base.wrapping_add(2 * 6 * 3 * itemsize));
    assert_eq!(rows.len(), 3 * 6 * 3 * itemsize);
    let run = array.get_slice_buffer_no_copy(&[3, 2, 1], &[4, 3, 3])?;
    assert_eq!(
        run.as_ptr(),
        base.wrapping_add((3 * 6 * 3 + 2 * 3 + 1) * itemsize)
    );
    assert_eq!(run, bytemuck::cast_slice::<u16, u8>(&data[61..63]));
    Ok(())
}
