use rayon::prelude::*;

use crate::error::EngineError;

// Output spatial extent of a sliding window along one axis
pub fn output_extent(input: usize, kernel: usize, pad: usize, stride: usize) -> Result<usize, EngineError> {
    if stride == 0 {
        return Err(EngineError::ShapeMismatch("im2col: stride must be at least 1".to_string()));
    }
    let padded = input + 2 * pad;
    if kernel == 0 || kernel > padded {
        return Err(EngineError::ShapeMismatch(
            format!("im2col: kernel of {} does not fit padded input of {}", kernel, padded)
        ));
    }
    Ok((padded - kernel) / stride + 1)
}

// Unrolls every receptive field of `img` (channels x height x width, width fastest) into
// `col`, a column-major (col_h * col_w) x (channels * kernel_h * kernel_w) matrix.
// Row (h, w) holds the patch under output position (h, w), column c is the patch
// element (c / (kh * kw), (c / kw) % kh, c % kw). Samples outside the input read as 0.
pub fn im2col(
    img: &[f32],
    channels: usize,
    height: usize,
    width: usize,
    kernel_h: usize,
    kernel_w: usize,
    pad_h: usize,
    pad_w: usize,
    stride_h: usize,
    stride_w: usize,
    col: &mut [f32],
) -> Result<(), EngineError> {
    let col_h = output_extent(height, kernel_h, pad_h, stride_h)?;
    let col_w = output_extent(width, kernel_w, pad_w, stride_w)?;
    let col_channels = channels * kernel_h * kernel_w;
    let plane = col_h * col_w;

    if img.len() < channels * height * width {
        return Err(EngineError::ShapeMismatch(
            format!("im2col: image holds {} elements, expected {}x{}x{}",
                    img.len(), channels, height, width)
        ));
    }
    if col.len() < plane * col_channels {
        return Err(EngineError::ShapeMismatch(
            format!("im2col: column buffer holds {} elements, needs {}", col.len(), plane * col_channels)
        ));
    }
    if plane == 0 || col_channels == 0 {
        return Ok(());
    }

    let fill_column = |c: usize, column: &mut [f32]| {
        let offset_w = c % kernel_w;
        let offset_h = (c / kernel_w) % kernel_h;
        let im_channel = c / kernel_h / kernel_w;
        let channel_base = im_channel * height;

        for h in 0..col_h {
            let h_pad = (h * stride_h + offset_h) as isize - pad_h as isize;
            let row = &mut column[h * col_w..(h + 1) * col_w];

            if h_pad < 0 || h_pad >= height as isize {
                row.fill(0.0);
                continue;
            }
            let img_row = (channel_base + h_pad as usize) * width;

            for (w, value) in row.iter_mut().enumerate() {
                let w_pad = (w * stride_w + offset_w) as isize - pad_w as isize;
                *value = if w_pad >= 0 && w_pad < width as isize {
                    img[img_row + w_pad as usize]
                } else {
                    0.0
                };
            }
        }
    };

    let col = &mut col[..plane * col_channels];
    if super::use_parallel(plane * col_channels) {
        col.par_chunks_mut(plane)
            .enumerate()
            .for_each(|(c, column)| fill_column(c, column));
    } else {
        col.chunks_mut(plane)
            .enumerate()
            .for_each(|(c, column)| fill_column(c, column));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extent_matches_stride_one_formula() {
        assert_eq!(output_extent(10, 5, 0, 1).unwrap(), 6);
        assert_eq!(output_extent(10, 5, 2, 1).unwrap(), 10);
        assert_eq!(output_extent(7, 3, 0, 2).unwrap(), 3);
        assert!(output_extent(3, 5, 0, 1).is_err());
        assert!(output_extent(3, 1, 0, 0).is_err());
    }

    #[test]
    fn unrolls_single_channel_without_padding() {
        // 3x3 image, values are their flat index
        let img: Vec<f32> = (0..9).map(|v| v as f32).collect();
        let mut col = vec![-1.0; 4 * 4];
        im2col(&img, 1, 3, 3, 2, 2, 0, 0, 1, 1, &mut col).unwrap();

        // Column c holds patch element (c / 2, c % 2) for output positions (0,0),(0,1),(1,0),(1,1)
        assert_eq!(&col[0..4], &[0.0, 1.0, 3.0, 4.0]);
        assert_eq!(&col[4..8], &[1.0, 2.0, 4.0, 5.0]);
        assert_eq!(&col[8..12], &[3.0, 4.0, 6.0, 7.0]);
        assert_eq!(&col[12..16], &[4.0, 5.0, 7.0, 8.0]);
    }

    #[test]
    fn padding_reads_as_zero() {
        let img = vec![1.0; 4];  // 2x2 ones
        // 1x1 kernel with padding 1 gives a 4x4 output framed by zeros
        let mut full = vec![-1.0; 16];
        im2col(&img, 1, 2, 2, 1, 1, 1, 1, 1, 1, &mut full).unwrap();
        assert_eq!(full, vec![
            0.0, 0.0, 0.0, 0.0,
            0.0, 1.0, 1.0, 0.0,
            0.0, 1.0, 1.0, 0.0,
            0.0, 0.0, 0.0, 0.0,
        ]);

        // 2x2 kernel with padding 1 over a 1 channel 2x2 image, column c = 3 is offset (1, 1)
        let mut big = vec![-1.0; 9 * 4];
        im2col(&img, 1, 2, 2, 2, 2, 1, 1, 1, 1, &mut big).unwrap();
        assert_eq!(&big[27..36], &[1.0, 1.0, 0.0, 1.0, 1.0, 0.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn channels_follow_kernel_elements() {
        // Two 1x1 channels, 1x1 kernel: one column per channel
        let img = [3.0, 7.0];
        let mut col = [0.0; 2];
        im2col(&img, 2, 1, 1, 1, 1, 0, 0, 1, 1, &mut col).unwrap();
        assert_eq!(col, [3.0, 7.0]);
    }

    #[test]
    fn short_buffers_are_rejected() {
        let img = [0.0; 8];
        let mut col = [0.0; 3];
        assert!(im2col(&img, 1, 3, 3, 2, 2, 0, 0, 1, 1, &mut col).is_err());
    }
}
