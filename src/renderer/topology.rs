//! 眼睛/显示拓扑
//!
//! 负责回答上游渲染管理器提供的那组几何查询：
//! 有几只眼睛、几个显示、每只眼睛在哪个显示上、每只眼睛的视口，
//! 以及每个显示的窗口应该开多大、放在哪里。

use crate::core::config::{ConstructorParameters, DisplayMode, DisplayRotation};
use crate::core::error::{ConfigError, PreconditionError, Result};
use crate::core::math::Viewport;

/// 创建一个窗口所需的全部参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowDescriptor {
    pub display: usize,
    pub title: String,
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    pub fullscreen: bool,
    pub resizable: bool,
}

/// 显示拓扑
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayTopology {
    num_eyes: usize,
    num_displays: usize,
    mode: DisplayMode,
    rotation: DisplayRotation,
    display_width: u32,
    display_height: u32,
}

impl DisplayTopology {
    /// 从构造参数建立拓扑，并检查其自洽性
    pub fn from_params(params: &ConstructorParameters) -> Result<Self> {
        let invalid = |field: &str, reason: &str| ConfigError::InvalidValue {
            field: field.to_string(),
            reason: reason.to_string(),
        };

        if params.display_width == 0 || params.display_height == 0 {
            return Err(invalid("display.width/height", "must be greater than 0").into());
        }
        if !matches!(params.num_eyes, 1 | 2) {
            return Err(invalid("display.eyes", "must be 1 or 2").into());
        }
        let displays_ok = match params.display_mode {
            DisplayMode::HorizontalSideBySide | DisplayMode::VerticalSideBySide => {
                params.num_displays == 1
            }
            DisplayMode::FullScreen => params.num_displays == params.num_eyes,
        };
        if !displays_ok || params.num_displays == 0 {
            return Err(invalid("display.displays", "does not match eye count and mode").into());
        }

        Ok(Self {
            num_eyes: params.num_eyes,
            num_displays: params.num_displays,
            mode: params.display_mode,
            rotation: params.rotation,
            display_width: params.display_width,
            display_height: params.display_height,
        })
    }

    /// 没有任何眼睛和显示的拓扑，构造参数无效时使用
    pub fn empty(params: &ConstructorParameters) -> Self {
        Self {
            num_eyes: 0,
            num_displays: 0,
            mode: params.display_mode,
            rotation: params.rotation,
            display_width: params.display_width,
            display_height: params.display_height,
        }
    }

    pub fn num_eyes(&self) -> usize {
        self.num_eyes
    }

    pub fn num_displays(&self) -> usize {
        self.num_displays
    }

    pub fn check_eye(&self, eye: usize) -> Result<()> {
        if eye >= self.num_eyes {
            return Err(PreconditionError::NoSuchEye { eye, num_eyes: self.num_eyes }.into());
        }
        Ok(())
    }

    pub fn check_display(&self, display: usize) -> Result<()> {
        if display >= self.num_displays {
            return Err(PreconditionError::NoSuchDisplay {
                display,
                num_displays: self.num_displays,
            }
            .into());
        }
        Ok(())
    }

    /// 眼睛所在的显示
    pub fn display_used_by_eye(&self, eye: usize) -> Option<usize> {
        if eye >= self.num_eyes {
            return None;
        }
        if self.num_displays == 1 {
            Some(0)
        } else {
            Some(eye)
        }
    }

    /// 显示上承载的眼睛，按眼睛编号排序
    pub fn eyes_on_display(&self, display: usize) -> Vec<usize> {
        (0..self.num_eyes)
            .filter(|&eye| self.display_used_by_eye(eye) == Some(display))
            .collect()
    }

    /// 眼睛在其显示（未旋转坐标）中的视口
    pub fn eye_viewport(&self, eye: usize) -> Option<Viewport> {
        self.display_used_by_eye(eye)?;
        let (w, h) = (self.display_width, self.display_height);
        if self.num_eyes == 1 || self.mode == DisplayMode::FullScreen {
            return Some(Viewport::new(0, 0, w, h));
        }
        let viewport = match (self.mode, eye) {
            (DisplayMode::HorizontalSideBySide, 0) => Viewport::new(0, 0, w / 2, h),
            (DisplayMode::HorizontalSideBySide, _) => Viewport::new(w / 2, 0, w - w / 2, h),
            (DisplayMode::VerticalSideBySide, 0) => Viewport::new(0, 0, w, h / 2),
            (DisplayMode::VerticalSideBySide, _) => Viewport::new(0, h / 2, w, h - h / 2),
            (DisplayMode::FullScreen, _) => Viewport::new(0, 0, w, h),
        };
        Some(viewport)
    }

    /// 考虑旋转后的窗口尺寸：90°/270° 时宽高互换
    pub fn rotated_window_size(&self) -> [u32; 2] {
        if self.rotation.swaps_axes() {
            [self.display_height, self.display_width]
        } else {
            [self.display_width, self.display_height]
        }
    }

    /// 第 `display` 个窗口的创建参数
    ///
    /// 标题追加显示编号；窗口从基准 X 开始按旋转后的宽度从左到右平铺。
    pub fn window_descriptor(&self, display: usize, params: &ConstructorParameters) -> WindowDescriptor {
        let [width, height] = self.rotated_window_size();
        let x = params.window_x as i64 + display as i64 * width as i64;
        WindowDescriptor {
            display,
            title: format!("{}{}", params.window_title, display),
            x: x.clamp(i32::MIN as i64, i32::MAX as i64) as i32,
            y: params.window_y,
            width,
            height,
            fullscreen: params.fullscreen,
            resizable: true,
        }
    }

    /// 眼睛在实际可绘制区域中的呈现区域
    ///
    /// 视口先按旋转映射到窗口坐标，再按可绘制尺寸与请求尺寸之比缩放。
    pub fn present_region(&self, eye: usize, drawable: [u32; 2]) -> Option<Viewport> {
        let vp = self.eye_viewport(eye)?;
        let [window_w, window_h] = self.rotated_window_size();
        let rotated = if self.rotation.swaps_axes() {
            Viewport::new(vp.top, vp.left, vp.height, vp.width)
        } else {
            vp
        };
        let scale = |value: u32, to: u32, from: u32| -> u32 {
            ((value as u64 * to as u64) / from.max(1) as u64) as u32
        };
        let left = scale(rotated.left, drawable[0], window_w);
        let top = scale(rotated.top, drawable[1], window_h);
        let right = scale(rotated.right(), drawable[0], window_w);
        let bottom = scale(rotated.bottom(), drawable[1], window_h);
        Some(Viewport::new(left, top, right - left, bottom - top))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> ConstructorParameters {
        ConstructorParameters {
            window_title: "HMD".to_string(),
            window_x: 100,
            window_y: 50,
            display_width: 1920,
            display_height: 1080,
            ..ConstructorParameters::default()
        }
    }

    #[test]
    fn test_side_by_side_viewports() {
        let topology = DisplayTopology::from_params(&params()).unwrap();
        assert_eq!(topology.num_eyes(), 2);
        assert_eq!(topology.num_displays(), 1);
        assert_eq!(topology.eye_viewport(0), Some(Viewport::new(0, 0, 960, 1080)));
        assert_eq!(topology.eye_viewport(1), Some(Viewport::new(960, 0, 960, 1080)));
        assert_eq!(topology.eye_viewport(2), None);
        assert_eq!(topology.eyes_on_display(0), vec![0, 1]);
    }

    #[test]
    fn test_vertical_and_full_screen_viewports() {
        let mut p = params();
        p.display_mode = DisplayMode::VerticalSideBySide;
        let topology = DisplayTopology::from_params(&p).unwrap();
        assert_eq!(topology.eye_viewport(1), Some(Viewport::new(0, 540, 1920, 540)));

        p.display_mode = DisplayMode::FullScreen;
        p.num_displays = 2;
        let topology = DisplayTopology::from_params(&p).unwrap();
        assert_eq!(topology.display_used_by_eye(1), Some(1));
        assert_eq!(topology.eye_viewport(1), Some(Viewport::new(0, 0, 1920, 1080)));
        assert_eq!(topology.eyes_on_display(1), vec![1]);
    }

    #[test]
    fn test_rejects_inconsistent_topology() {
        let mut p = params();
        p.num_displays = 2;
        assert!(DisplayTopology::from_params(&p).is_err());
        p.num_eyes = 3;
        assert!(DisplayTopology::from_params(&p).is_err());

        // 全屏模式下每个显示必须承载一只眼睛
        let mut p = params();
        p.display_mode = DisplayMode::FullScreen;
        p.num_eyes = 1;
        p.num_displays = 2;
        assert!(DisplayTopology::from_params(&p).is_err());
        p.num_displays = 1;
        assert!(DisplayTopology::from_params(&p).is_ok());
    }

    #[test]
    fn test_window_descriptor_carries_fullscreen_flag() {
        let mut p = params();
        let topology = DisplayTopology::from_params(&p).unwrap();
        assert!(!topology.window_descriptor(0, &p).fullscreen);

        p.fullscreen = true;
        let window = topology.window_descriptor(0, &p);
        assert!(window.fullscreen);
        assert!(window.resizable);
    }

    #[test]
    fn test_rotation_swaps_window_axes() {
        for (rotation, expected) in [
            (DisplayRotation::Zero, [1920, 1080]),
            (DisplayRotation::Ninety, [1080, 1920]),
            (DisplayRotation::OneEighty, [1920, 1080]),
            (DisplayRotation::TwoSeventy, [1080, 1920]),
        ] {
            let mut p = params();
            p.rotation = rotation;
            let topology = DisplayTopology::from_params(&p).unwrap();
            let window = topology.window_descriptor(0, &p);
            assert_eq!([window.width, window.height], expected, "{:?}", rotation);
        }
    }

    #[test]
    fn test_windows_tile_left_to_right() {
        let mut p = params();
        p.display_mode = DisplayMode::FullScreen;
        p.num_displays = 2;
        p.rotation = DisplayRotation::Ninety;
        let topology = DisplayTopology::from_params(&p).unwrap();

        let first = topology.window_descriptor(0, &p);
        let second = topology.window_descriptor(1, &p);
        assert_eq!(first.title, "HMD0");
        assert_eq!(second.title, "HMD1");
        assert_eq!(first.x, 100);
        assert_eq!(second.x, 100 + 1080);
        assert_eq!(second.y, 50);
    }

    #[test]
    fn test_present_region_scales_and_rotates() {
        let topology = DisplayTopology::from_params(&params()).unwrap();
        // 高 DPI 宿主：可绘制区域是请求的两倍
        assert_eq!(
            topology.present_region(1, [3840, 2160]),
            Some(Viewport::new(1920, 0, 1920, 2160))
        );

        let mut p = params();
        p.rotation = DisplayRotation::Ninety;
        let topology = DisplayTopology::from_params(&p).unwrap();
        assert_eq!(
            topology.present_region(1, [1080, 1920]),
            Some(Viewport::new(0, 960, 1080, 960))
        );
    }
}
