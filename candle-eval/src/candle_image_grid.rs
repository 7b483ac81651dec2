use anyhow::{anyhow, bail};
use candle_core::{DType, Tensor};
use log::info;
use ndarray::{s, Array3, Array4, Axis};
use std::path::Path;

///
/// Convert an image batch to `(n, C, H, W)` `f32` values
///
pub trait ToImageArray4 {
    fn to_image_array4(&self) -> anyhow::Result<Array4<f32>>;
}

impl ToImageArray4 for Tensor {
    fn to_image_array4(&self) -> anyhow::Result<Array4<f32>> {
        let (n, c, h, w) = self.dims4()?;
        let values = self.to_dtype(DType::F32)?.flatten_all()?.to_vec1::<f32>()?;
        Ok(Array4::from_shape_vec((n, c, h, w), values)?)
    }
}

impl ToImageArray4 for Array4<f32> {
    fn to_image_array4(&self) -> anyhow::Result<Array4<f32>> {
        Ok(self.clone())
    }
}

/// `floor(sqrt(n))`, but at least one image per row
pub fn default_grid_nrow(num_images: usize) -> usize {
    num_images.isqrt().max(1)
}

///
/// Tile images row by row into a `(3, H', W')` canvas with
/// `nrow` images per row and `padding` zero pixels around each tile.
/// Single-channel images are repeated over the three channels.
///
/// * `images` - n x C x H x W, C in {1, 3}
/// * `nrow` - images per row, clamped to `[1, n]`
/// * `padding` - gap between tiles
///
pub fn make_grid<I>(images: &I, nrow: usize, padding: usize) -> anyhow::Result<Array3<f32>>
where
    I: ToImageArray4 + ?Sized,
{
    let images = images.to_image_array4()?;
    let (n, c, h, w) = images.dim();

    if n == 0 {
        bail!("no images to put on a grid");
    }
    if c != 1 && c != 3 {
        bail!("expected 1 or 3 channels, got {}", c);
    }

    let images = images
        .broadcast((n, 3, h, w))
        .ok_or_else(|| anyhow!("cannot expand {} channels to RGB", c))?
        .to_owned();

    let xmaps = nrow.clamp(1, n);
    let ymaps = n.div_ceil(xmaps);
    let (tile_h, tile_w) = (h + padding, w + padding);

    let mut grid = Array3::<f32>::zeros((3, ymaps * tile_h + padding, xmaps * tile_w + padding));

    for (k, img) in images.axis_iter(Axis(0)).enumerate() {
        let (top, left) = ((k / xmaps) * tile_h + padding, (k % xmaps) * tile_w + padding);
        grid.slice_mut(s![.., top..top + h, left..left + w])
            .assign(&img);
    }

    Ok(grid)
}

fn to_pixel(x: f32) -> u8 {
    // NaN ends up 0
    (x * 255. + 0.5).clamp(0., 255.) as u8
}

///
/// Compose `images` into one grid and write it to `file_path`. The
/// raster format follows the file extension.
///
/// * `images` - n x C x H x W, each pixel already in `[0, 1]`
/// * `file_path` - output image file
/// * `nrow` - images per row; `floor(sqrt(n))` if `None`
///
pub fn save_grid_images<I, P>(images: &I, file_path: P, nrow: Option<usize>) -> anyhow::Result<()>
where
    I: ToImageArray4 + ?Sized,
    P: AsRef<Path>,
{
    let images = images.to_image_array4()?;
    let nrow = nrow.unwrap_or_else(|| default_grid_nrow(images.dim().0));

    let grid = make_grid(&images, nrow, 0)?;
    let (_, height, width) = grid.dim();

    let canvas = image::RgbImage::from_fn(u32::try_from(width)?, u32::try_from(height)?, |x, y| {
        let (i, j) = (y as usize, x as usize);
        image::Rgb([
            to_pixel(grid[[0, i, j]]),
            to_pixel(grid[[1, i, j]]),
            to_pixel(grid[[2, i, j]]),
        ])
    });

    canvas.save(file_path.as_ref())?;
    info!(
        "wrote a {} x {} grid of {} images to {}",
        height,
        width,
        images.dim().0,
        file_path.as_ref().display()
    );
    Ok(())
}
