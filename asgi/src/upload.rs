/// Upload engine: moves CPU data into buffers and images
///
/// Two paths:
/// - direct: host-visible destinations are written through their mapping
///   (flushed when not host-coherent);
/// - staged: data is copied into a transient staging buffer and a one-shot
///   transfer copies it into the destination. Batches record every copy into
///   a single submission.
///
/// Every staged submission blocks until the GPU finished it. Staging buffers
/// are released before returning, on success and on failure.
///
/// The engine is written against [`TransferDevice`] so any backend (and the
/// test mock) gets identical semantics.

use rustc_hash::FxHashMap;
use crate::device::{BufferHandle, BufferInfo, ImageAspectFlags, ImageHandle, ImageInfo, ImageRegion};
use crate::error::{Error, Result};
use crate::image_layout::{ImageLayoutTracker, LayoutTransition};
use crate::{gi_bail_warn, gi_trace};

/// Backend services the upload engine needs
pub trait TransferDevice {
    /// Backend staging buffer (CPU-only memory, transfer source)
    type Staging;

    /// Size, usage and memory of an upload destination
    fn destination_buffer(&self, buffer: BufferHandle) -> Result<BufferInfo>;

    /// Write through the buffer's mapping, flushing the range if not host-coherent
    fn write_buffer_mapped(&mut self, buffer: BufferHandle, offset: u64, data: &[u8]) -> Result<()>;

    /// Create a staging buffer holding a copy of `data`
    fn create_staging(&mut self, data: &[u8]) -> Result<Self::Staging>;

    /// Release a staging buffer and its allocation
    fn destroy_staging(&mut self, staging: Self::Staging);

    /// Start recording the one-shot transfer command buffer
    fn begin_transfer(&mut self) -> Result<()>;

    /// Copy the whole staging buffer into `buffer` at `offset`
    fn record_buffer_copy(
        &mut self,
        staging: &Self::Staging,
        buffer: BufferHandle,
        offset: u64,
        size: u64,
    ) -> Result<()>;

    /// Image memory barrier over one mip level
    fn record_image_barrier(
        &mut self,
        image: ImageHandle,
        aspect: ImageAspectFlags,
        transition: &LayoutTransition,
    ) -> Result<()>;

    /// Copy the staging buffer into `region` of `image`
    fn record_image_copy(
        &mut self,
        staging: &Self::Staging,
        image: ImageHandle,
        aspect: ImageAspectFlags,
        region: &ImageRegion,
    ) -> Result<()>;

    /// End recording, submit, and wait for completion
    fn submit_transfer(&mut self) -> Result<()>;

    /// Drop whatever was recorded since `begin_transfer`
    fn abort_transfer(&mut self);

    /// Description of an upload destination image
    fn destination_image(&self, image: ImageHandle) -> Result<ImageInfo>;

    /// Current layout tracker of `image`
    fn image_tracker(&self, image: ImageHandle) -> Result<&ImageLayoutTracker>;

    /// Replace the tracker of `image` after a successful submission
    fn commit_image_tracker(&mut self, image: ImageHandle, tracker: ImageLayoutTracker) -> Result<()>;
}

// ===== BATCHES =====

#[derive(Debug, Clone, Copy)]
struct PendingBufferUpdate<'a> {
    buffer: BufferHandle,
    offset: u64,
    data: &'a [u8],
}

/// Buffer updates recorded into a single submission
///
/// Source bytes are borrowed until the batch is ended.
#[derive(Debug, Default)]
pub struct BufferUpdateBatch<'a> {
    items: Vec<PendingBufferUpdate<'a>>,
}

impl<'a> BufferUpdateBatch<'a> {
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Number of queued staged updates
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[derive(Debug, Clone, Copy)]
struct PendingImageUpdate<'a> {
    image: ImageHandle,
    region: ImageRegion,
    data: &'a [u8],
}

/// Image updates recorded into a single submission
#[derive(Debug, Default)]
pub struct ImageUpdateBatch<'a> {
    items: Vec<PendingImageUpdate<'a>>,
}

impl<'a> ImageUpdateBatch<'a> {
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

// ===== BUFFERS =====

/// Write `data` into `buffer` at `offset`
///
/// Host-visible destinations are always written directly, even inside a batch.
/// Otherwise the update is queued into `batch`, or staged and submitted
/// immediately when no batch is given.
pub fn update_buffer<'a, D>(
    device: &mut D,
    buffer: BufferHandle,
    offset: u64,
    data: &'a [u8],
    batch: Option<&mut BufferUpdateBatch<'a>>,
) -> Result<()>
where
    D: TransferDevice + ?Sized,
{
    let info = device.destination_buffer(buffer)?;
    if !info.contains_range(offset, data.len() as u64) {
        gi_bail_warn!("asgi::upload",
            "Buffer update out of range: offset {} + {} bytes > size {}",
            offset, data.len(), info.size);
    }
    if data.is_empty() {
        return Ok(());
    }

    if info.memory.host_visible {
        return device.write_buffer_mapped(buffer, offset, data);
    }

    let item = PendingBufferUpdate { buffer, offset, data };
    match batch {
        Some(batch) => {
            batch.items.push(item);
            Ok(())
        }
        None => submit_buffer_updates(device, &[item]),
    }
}

/// Submit every queued update of `batch` in one command buffer and wait
///
/// An empty batch succeeds without submitting anything.
pub fn end_update_buffer<D>(device: &mut D, batch: BufferUpdateBatch<'_>) -> Result<()>
where
    D: TransferDevice + ?Sized,
{
    if batch.is_empty() {
        return Ok(());
    }
    submit_buffer_updates(device, &batch.items)
}

fn submit_buffer_updates<D>(device: &mut D, items: &[PendingBufferUpdate<'_>]) -> Result<()>
where
    D: TransferDevice + ?Sized,
{
    let stagings = create_stagings(device, items.iter().map(|item| item.data))?;

    let result = record_and_submit(device, |device| {
        for (item, staging) in items.iter().zip(&stagings) {
            device.record_buffer_copy(staging, item.buffer, item.offset, item.data.len() as u64)?;
        }
        Ok(())
    });

    release_stagings(device, stagings);
    if result.is_ok() {
        gi_trace!("asgi::upload", "Submitted {} staged buffer update(s)", items.len());
    }
    result
}

// ===== IMAGES =====

/// Upload `data` into `region` of a 2D image
///
/// `data` must hold exactly `width * height` tightly packed texels. Without a
/// batch the upload is submitted immediately; the image's layout tracker is
/// only updated once the submission succeeded.
pub fn update_image_2d<'a, D>(
    device: &mut D,
    image: ImageHandle,
    region: &ImageRegion,
    data: &'a [u8],
    batch: Option<&mut ImageUpdateBatch<'a>>,
) -> Result<()>
where
    D: TransferDevice + ?Sized,
{
    let info = device.destination_image(image)?;
    validate_image_region(&info, region, data.len())?;

    let item = PendingImageUpdate { image, region: *region, data };
    match batch {
        Some(batch) => {
            batch.items.push(item);
            Ok(())
        }
        None => submit_image_updates(device, &[item]),
    }
}

/// Submit every queued image update of `batch` in one command buffer and wait
pub fn end_update_image<D>(device: &mut D, batch: ImageUpdateBatch<'_>) -> Result<()>
where
    D: TransferDevice + ?Sized,
{
    if batch.is_empty() {
        return Ok(());
    }
    submit_image_updates(device, &batch.items)
}

fn submit_image_updates<D>(device: &mut D, items: &[PendingImageUpdate<'_>]) -> Result<()>
where
    D: TransferDevice + ?Sized,
{
    // Scratch trackers, chained across every update of the same image
    let mut scratch: FxHashMap<ImageHandle, (ImageAspectFlags, ImageLayoutTracker)> = FxHashMap::default();
    for item in items {
        if !scratch.contains_key(&item.image) {
            let info = device.destination_image(item.image)?;
            let tracker = device.image_tracker(item.image)?.clone();
            scratch.insert(item.image, (info.aspect, tracker));
        }
    }

    let stagings = create_stagings(device, items.iter().map(|item| item.data))?;

    let result = record_and_submit(device, |device| {
        for (item, staging) in items.iter().zip(&stagings) {
            let (aspect, tracker) = scratch
                .get_mut(&item.image)
                .ok_or_else(|| Error::InvalidResource("image vanished during upload".to_string()))?;
            record_image_upload(device, staging, item.image, *aspect, &item.region, tracker)?;
        }
        Ok(())
    });

    release_stagings(device, stagings);
    result?;

    for (image, (_, tracker)) in scratch {
        device.commit_image_tracker(image, tracker)?;
    }
    gi_trace!("asgi::upload", "Submitted {} image update(s)", items.len());
    Ok(())
}

/// Barrier into TransferDest if needed, copy, barrier into the read state
fn record_image_upload<D>(
    device: &mut D,
    staging: &D::Staging,
    image: ImageHandle,
    aspect: ImageAspectFlags,
    region: &ImageRegion,
    tracker: &mut ImageLayoutTracker,
) -> Result<()>
where
    D: TransferDevice + ?Sized,
{
    if let Some(transition) = tracker.prepare_transfer_write(region.level) {
        device.record_image_barrier(image, aspect, &transition)?;
    }
    device.record_image_copy(staging, image, aspect, region)?;
    let transition = tracker.finish_transfer_write(region.level, aspect);
    device.record_image_barrier(image, aspect, &transition)
}

/// Check level, bounds and data size of an image upload
pub fn validate_image_region(info: &ImageInfo, region: &ImageRegion, data_len: usize) -> Result<()> {
    if region.level >= info.mip_levels {
        gi_bail_warn!("asgi::upload",
            "Mip level {} out of range (image has {} levels)", region.level, info.mip_levels);
    }
    if region.width == 0 || region.height == 0 {
        gi_bail_warn!("asgi::upload", "Empty image region {}x{}", region.width, region.height);
    }

    let (level_width, level_height) = info.mip_extent(region.level);
    let fits_x = region.x.checked_add(region.width).map_or(false, |end| end <= level_width);
    let fits_y = region.y.checked_add(region.height).map_or(false, |end| end <= level_height);
    if !fits_x || !fits_y {
        gi_bail_warn!("asgi::upload",
            "Region ({}, {}) {}x{} exceeds mip {} extent {}x{}",
            region.x, region.y, region.width, region.height,
            region.level, level_width, level_height);
    }

    let texel_size = info.format.size_bytes() as u64;
    if texel_size == 0 {
        gi_bail_warn!("asgi::upload", "Format {:?} has no packed texel size", info.format);
    }
    let expected = region.width as u64 * region.height as u64 * texel_size;
    if data_len as u64 != expected {
        gi_bail_warn!("asgi::upload",
            "Image data is {} bytes, region {}x{} of {:?} needs {}",
            data_len, region.width, region.height, info.format, expected);
    }
    Ok(())
}

// ===== SHARED =====

/// One staging buffer per source slice; all-or-nothing
fn create_stagings<'a, D, I>(device: &mut D, sources: I) -> Result<Vec<D::Staging>>
where
    D: TransferDevice + ?Sized,
    I: Iterator<Item = &'a [u8]>,
{
    let mut stagings = Vec::new();
    for data in sources {
        match device.create_staging(data) {
            Ok(staging) => stagings.push(staging),
            Err(e) => {
                release_stagings(device, stagings);
                return Err(e);
            }
        }
    }
    Ok(stagings)
}

fn release_stagings<D>(device: &mut D, stagings: Vec<D::Staging>)
where
    D: TransferDevice + ?Sized,
{
    for staging in stagings {
        device.destroy_staging(staging);
    }
}

/// Begin, record, then submit; a recording failure aborts without submitting
fn record_and_submit<D, F>(device: &mut D, record: F) -> Result<()>
where
    D: TransferDevice + ?Sized,
    F: FnOnce(&mut D) -> Result<()>,
{
    device.begin_transfer()?;
    if let Err(e) = record(device) {
        device.abort_transfer();
        return Err(e);
    }
    device.submit_transfer()
}

#[cfg(test)]
#[path = "upload_tests.rs"]
mod tests;
