// SPDX-License-Identifier: CEPL-1.0
use anyhow::{Context, Result};
use ash::prelude::VkResult;
use ash::vk;
use lumen_core::InitError;
use lumen_render::RenderSize;

/// Floor for the swapchain length; one more than double buffering so the
/// presentation engine rarely stalls us.
pub const PREFERRED_IMAGE_COUNT: u32 = 3;
pub const PREFERRED_FORMAT: vk::Format = vk::Format::B8G8R8A8_SRGB;
pub const PREFERRED_COLOR_SPACE: vk::ColorSpaceKHR = vk::ColorSpaceKHR::SRGB_NONLINEAR;

/// Negotiated swapchain parameters.
///
/// Valid only for the surface as it was when queried: once the drawable
/// resizes, the extent (and possibly the rest) is stale.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SurfaceConfiguration {
    pub image_count: u32,
    pub format: vk::Format,
    pub color_space: vk::ColorSpaceKHR,
    pub present_mode: vk::PresentModeKHR,
    pub extent: vk::Extent2D,
}

/// `max(3, min)`, capped by `max` (0 == "no max").
pub fn image_count(caps: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let count = PREFERRED_IMAGE_COUNT.max(caps.min_image_count);
    if caps.max_image_count > 0 && caps.max_image_count < count {
        caps.max_image_count
    } else {
        count
    }
}

pub fn choose_surface_format(
    formats: &[vk::SurfaceFormatKHR],
) -> Result<vk::SurfaceFormatKHR, InitError> {
    let first = formats.first().copied().ok_or_else(|| {
        InitError::SwapchainConfigurationFailure("surface reports no formats".to_owned())
    })?;

    Ok(formats
        .iter()
        .copied()
        .find(|f| f.format == PREFERRED_FORMAT && f.color_space == PREFERRED_COLOR_SPACE)
        .unwrap_or(first))
}

/// MAILBOX if offered, else FIFO. Nothing else is considered.
pub fn choose_present_mode(
    modes: &[vk::PresentModeKHR],
) -> Result<vk::PresentModeKHR, InitError> {
    [vk::PresentModeKHR::MAILBOX, vk::PresentModeKHR::FIFO]
        .into_iter()
        .find(|m| modes.contains(m))
        .ok_or_else(|| {
            InitError::SwapchainConfigurationFailure(
                "surface does not offer the mandatory FIFO present mode".to_owned(),
            )
        })
}

/// The platform's current extent verbatim, unless it is the `u32::MAX`
/// "you decide" sentinel; then the window size clamped into the limits.
pub fn choose_extent(
    caps: &vk::SurfaceCapabilitiesKHR,
    window: RenderSize,
) -> Result<vk::Extent2D, InitError> {
    if caps.current_extent.width != u32::MAX {
        return Ok(caps.current_extent);
    }

    let (min, max) = (caps.min_image_extent, caps.max_image_extent);
    if min.width > max.width || min.height > max.height {
        return Err(InitError::SwapchainConfigurationFailure(format!(
            "min image extent {}x{} exceeds max {}x{}",
            min.width, min.height, max.width, max.height
        )));
    }

    Ok(vk::Extent2D {
        width: window.width.clamp(min.width, max.width),
        height: window.height.clamp(min.height, max.height),
    })
}

pub fn configure(
    caps: &vk::SurfaceCapabilitiesKHR,
    formats: &[vk::SurfaceFormatKHR],
    present_modes: &[vk::PresentModeKHR],
    window: RenderSize,
) -> Result<SurfaceConfiguration, InitError> {
    let format = choose_surface_format(formats)?;
    Ok(SurfaceConfiguration {
        image_count: image_count(caps),
        format: format.format,
        color_space: format.color_space,
        present_mode: choose_present_mode(present_modes)?,
        extent: choose_extent(caps, window)?,
    })
}

/// Swapchain create info for `config`.
///
/// `queue_families` is [`QueueAssignment::unique_families`]: one entry means
/// exclusive ownership, two means the images are shared concurrently.
///
/// [`QueueAssignment::unique_families`]: crate::queues::QueueAssignment::unique_families
pub fn swapchain_create_info<'a>(
    surface: vk::SurfaceKHR,
    config: &SurfaceConfiguration,
    pre_transform: vk::SurfaceTransformFlagsKHR,
    queue_families: &'a [u32],
) -> vk::SwapchainCreateInfoKHR<'a> {
    let info = vk::SwapchainCreateInfoKHR {
        s_type: vk::StructureType::SWAPCHAIN_CREATE_INFO_KHR,
        surface,
        min_image_count: config.image_count,
        image_format: config.format,
        image_color_space: config.color_space,
        image_extent: config.extent,
        image_array_layers: 1,
        image_usage: vk::ImageUsageFlags::COLOR_ATTACHMENT,
        image_sharing_mode: vk::SharingMode::EXCLUSIVE,
        pre_transform,
        composite_alpha: vk::CompositeAlphaFlagsKHR::OPAQUE,
        present_mode: config.present_mode,
        clipped: vk::TRUE,
        ..Default::default()
    };

    if queue_families.len() > 1 {
        info.image_sharing_mode(vk::SharingMode::CONCURRENT)
            .queue_family_indices(queue_families)
    } else {
        info
    }
}

/// Creates and destroys image views. `ash::Device` in production; tests use
/// a recording fake.
pub trait ImageViewFactory {
    unsafe fn create_view(&self, info: &vk::ImageViewCreateInfo<'_>) -> VkResult<vk::ImageView>;
    unsafe fn destroy_view(&self, view: vk::ImageView);
    /// Block until the device has no work in flight.
    unsafe fn wait_idle(&self);
}

impl ImageViewFactory for ash::Device {
    unsafe fn create_view(&self, info: &vk::ImageViewCreateInfo<'_>) -> VkResult<vk::ImageView> {
        self.create_image_view(info, None)
    }

    unsafe fn destroy_view(&self, view: vk::ImageView) {
        self.destroy_image_view(view, None)
    }

    unsafe fn wait_idle(&self) {
        self.device_wait_idle().ok();
    }
}

/// 2D color view over mip 0 / layer 0 of a swapchain image.
pub fn view_create_info(image: vk::Image, format: vk::Format) -> vk::ImageViewCreateInfo<'static> {
    vk::ImageViewCreateInfo {
        s_type: vk::StructureType::IMAGE_VIEW_CREATE_INFO,
        image,
        view_type: vk::ImageViewType::TYPE_2D,
        format,
        subresource_range: vk::ImageSubresourceRange {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
        },
        ..Default::default()
    }
}

/// One view per image, same order, so view `i` always belongs to image `i`.
///
/// If view `k` fails, views `0..k` are destroyed before returning the error.
pub unsafe fn create_image_views<F: ImageViewFactory + ?Sized>(
    factory: &F,
    images: &[vk::Image],
    format: vk::Format,
) -> Result<Vec<vk::ImageView>> {
    let mut views = Vec::with_capacity(images.len());
    for (i, &image) in images.iter().enumerate() {
        match factory.create_view(&view_create_info(image, format)) {
            Ok(view) => views.push(view),
            Err(e) => {
                for &view in &views {
                    factory.destroy_view(view);
                }
                return Err(e).with_context(|| format!("create_image_view (swapchain image {i})"));
            }
        }
    }
    Ok(views)
}

/// Teardown counterpart of [`create_image_views`]: waits for the device to go
/// idle, then destroys every view.
pub unsafe fn destroy_image_views<F: ImageViewFactory + ?Sized>(
    factory: &F,
    views: &[vk::ImageView],
) {
    factory.wait_idle();
    for &view in views {
        factory.destroy_view(view);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk::Handle;
    use std::cell::RefCell;

    const SENTINEL: vk::Extent2D = vk::Extent2D {
        width: u32::MAX,
        height: u32::MAX,
    };

    fn caps(min: u32, max: u32) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            min_image_count: min,
            max_image_count: max,
            current_extent: vk::Extent2D {
                width: 800,
                height: 600,
            },
            min_image_extent: vk::Extent2D {
                width: 1,
                height: 1,
            },
            max_image_extent: vk::Extent2D {
                width: 1024,
                height: 1024,
            },
            ..Default::default()
        }
    }

    fn fmt(format: vk::Format, color_space: vk::ColorSpaceKHR) -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR {
            format,
            color_space,
        }
    }

    #[test]
    fn image_count_rules() {
        assert_eq!(image_count(&caps(1, 0)), 3);
        assert_eq!(image_count(&caps(5, 5)), 5);
        assert_eq!(image_count(&caps(1, 2)), 2);
        assert_eq!(image_count(&caps(2, 4)), 3);
        assert_eq!(image_count(&caps(4, 0)), 4);
    }

    #[test]
    fn prefers_bgra_srgb_pair() {
        let formats = [
            fmt(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            fmt(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::DISPLAY_P3_NONLINEAR_EXT),
            fmt(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR),
        ];
        assert_eq!(choose_surface_format(&formats).unwrap(), formats[2]);
    }

    #[test]
    fn falls_back_to_first_reported_format() {
        let formats = [
            fmt(vk::Format::R16G16B16A16_SFLOAT, vk::ColorSpaceKHR::EXTENDED_SRGB_LINEAR_EXT),
            fmt(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::DISPLAY_P3_NONLINEAR_EXT),
        ];
        assert_eq!(choose_surface_format(&formats).unwrap(), formats[0]);
    }

    #[test]
    fn empty_format_list_is_a_configuration_failure() {
        assert!(matches!(
            choose_surface_format(&[]),
            Err(InitError::SwapchainConfigurationFailure(_))
        ));
    }

    #[test]
    fn present_mode_policy() {
        use vk::PresentModeKHR as P;
        assert_eq!(choose_present_mode(&[P::FIFO, P::MAILBOX]).unwrap(), P::MAILBOX);
        assert_eq!(choose_present_mode(&[P::IMMEDIATE, P::FIFO]).unwrap(), P::FIFO);
        assert_eq!(choose_present_mode(&[P::FIFO_RELAXED, P::FIFO]).unwrap(), P::FIFO);
        assert!(matches!(
            choose_present_mode(&[P::IMMEDIATE]),
            Err(InitError::SwapchainConfigurationFailure(_))
        ));
    }

    #[test]
    fn sentinel_extent_clamps_window_size() {
        let mut c = caps(1, 0);
        c.current_extent = SENTINEL;
        let e = choose_extent(
            &c,
            RenderSize {
                width: 1920,
                height: 1080,
            },
        )
        .unwrap();
        assert_eq!((e.width, e.height), (1024, 1024));

        c.min_image_extent = vk::Extent2D {
            width: 64,
            height: 64,
        };
        let e = choose_extent(
            &c,
            RenderSize {
                width: 10,
                height: 500,
            },
        )
        .unwrap();
        assert_eq!((e.width, e.height), (64, 500));
    }

    #[test]
    fn fixed_extent_is_used_verbatim() {
        let e = choose_extent(
            &caps(1, 0),
            RenderSize {
                width: 1920,
                height: 1080,
            },
        )
        .unwrap();
        assert_eq!((e.width, e.height), (800, 600));
    }

    #[test]
    fn inverted_extent_bounds_are_rejected() {
        let mut c = caps(1, 0);
        c.current_extent = SENTINEL;
        c.min_image_extent = vk::Extent2D {
            width: 2048,
            height: 1,
        };
        assert!(matches!(
            choose_extent(
                &c,
                RenderSize {
                    width: 100,
                    height: 100
                }
            ),
            Err(InitError::SwapchainConfigurationFailure(_))
        ));
    }

    #[test]
    fn swapchain_sharing_follows_queue_assignment() {
        let cfg = configure(
            &caps(2, 4),
            &[fmt(PREFERRED_FORMAT, PREFERRED_COLOR_SPACE)],
            &[vk::PresentModeKHR::FIFO],
            RenderSize {
                width: 800,
                height: 600,
            },
        )
        .unwrap();

        let one = [0u32];
        let info = swapchain_create_info(
            vk::SurfaceKHR::null(),
            &cfg,
            vk::SurfaceTransformFlagsKHR::IDENTITY,
            &one,
        );
        assert_eq!(info.image_sharing_mode, vk::SharingMode::EXCLUSIVE);
        assert_eq!(info.queue_family_index_count, 0);
        assert_eq!(info.min_image_count, 3);
        assert_eq!(info.image_usage, vk::ImageUsageFlags::COLOR_ATTACHMENT);

        let two = [0u32, 2];
        let info = swapchain_create_info(
            vk::SurfaceKHR::null(),
            &cfg,
            vk::SurfaceTransformFlagsKHR::IDENTITY,
            &two,
        );
        assert_eq!(info.image_sharing_mode, vk::SharingMode::CONCURRENT);
        assert_eq!(info.queue_family_index_count, 2);
    }

    /// Hands out view handles equal to the source image handle, optionally
    /// failing on one index.
    struct FakeDevice {
        fail_at: Option<usize>,
        created: RefCell<usize>,
        destroyed: RefCell<Vec<vk::ImageView>>,
        idle: RefCell<bool>,
        destroyed_while_busy: RefCell<usize>,
        infos: RefCell<Vec<(vk::ImageViewType, vk::Format, vk::ImageSubresourceRange)>>,
    }

    impl FakeDevice {
        fn new(fail_at: Option<usize>) -> Self {
            FakeDevice {
                fail_at,
                created: RefCell::new(0),
                destroyed: RefCell::new(Vec::new()),
                idle: RefCell::new(false),
                destroyed_while_busy: RefCell::new(0),
                infos: RefCell::new(Vec::new()),
            }
        }
    }

    impl ImageViewFactory for FakeDevice {
        unsafe fn create_view(
            &self,
            info: &vk::ImageViewCreateInfo<'_>,
        ) -> VkResult<vk::ImageView> {
            let n = *self.created.borrow();
            if self.fail_at == Some(n) {
                return Err(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY);
            }
            *self.created.borrow_mut() += 1;
            self.infos
                .borrow_mut()
                .push((info.view_type, info.format, info.subresource_range));
            Ok(vk::ImageView::from_raw(info.image.as_raw()))
        }

        unsafe fn destroy_view(&self, view: vk::ImageView) {
            if !*self.idle.borrow() {
                *self.destroyed_while_busy.borrow_mut() += 1;
            }
            self.destroyed.borrow_mut().push(view);
        }

        unsafe fn wait_idle(&self) {
            *self.idle.borrow_mut() = true;
        }
    }

    fn images(n: u64) -> Vec<vk::Image> {
        (1..=n).map(|i| vk::Image::from_raw(0x1000 + i)).collect()
    }

    #[test]
    fn views_match_images_one_to_one() {
        for n in [0u64, 1, 3, 5] {
            let dev = FakeDevice::new(None);
            let imgs = images(n);
            let views = unsafe { create_image_views(&dev, &imgs, PREFERRED_FORMAT) }.unwrap();
            assert_eq!(views.len(), imgs.len());
            for (view, image) in views.iter().zip(&imgs) {
                assert_eq!(view.as_raw(), image.as_raw());
            }
        }
    }

    #[test]
    fn views_are_2d_color_single_mip_single_layer() {
        let dev = FakeDevice::new(None);
        unsafe { create_image_views(&dev, &images(2), vk::Format::B8G8R8A8_SRGB) }.unwrap();
        for (ty, format, range) in dev.infos.borrow().iter() {
            assert_eq!(*ty, vk::ImageViewType::TYPE_2D);
            assert_eq!(*format, vk::Format::B8G8R8A8_SRGB);
            assert_eq!(range.aspect_mask, vk::ImageAspectFlags::COLOR);
            assert_eq!((range.base_mip_level, range.level_count), (0, 1));
            assert_eq!((range.base_array_layer, range.layer_count), (0, 1));
        }
    }

    #[test]
    fn failed_view_releases_earlier_ones() {
        let dev = FakeDevice::new(Some(2));
        let imgs = images(4);
        let err = unsafe { create_image_views(&dev, &imgs, PREFERRED_FORMAT) }.unwrap_err();
        assert_eq!(
            err.downcast_ref::<vk::Result>(),
            Some(&vk::Result::ERROR_OUT_OF_DEVICE_MEMORY)
        );
        let destroyed: Vec<u64> = dev.destroyed.borrow().iter().map(|v| v.as_raw()).collect();
        assert_eq!(destroyed, vec![imgs[0].as_raw(), imgs[1].as_raw()]);
    }

    #[test]
    fn teardown_waits_for_idle_before_destroying_views() {
        let dev = FakeDevice::new(None);
        let imgs = images(3);
        let views = unsafe { create_image_views(&dev, &imgs, PREFERRED_FORMAT) }.unwrap();

        unsafe { destroy_image_views(&dev, &views) };
        assert!(*dev.idle.borrow());
        assert_eq!(*dev.destroyed_while_busy.borrow(), 0);
        assert_eq!(*dev.destroyed.borrow(), views);
    }
}
