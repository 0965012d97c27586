//! 数学类型模块
//!
//! 基于 `nalgebra` 的位姿、投影、视口和颜色类型，
//! 即每眼渲染回调收到的几何数据。

pub use nalgebra::{Isometry3, Matrix4, Translation3, UnitQuaternion, Vector3};

/// 6 自由度位姿（旋转 + 平移，单位：米）
pub type Pose = Isometry3<f64>;

/// 像素视口，原点在左上角
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Viewport {
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(left: u32, top: u32, width: u32, height: u32) -> Self {
        Self { left, top, width, height }
    }

    /// 宽高比
    pub fn aspect(&self) -> f64 {
        if self.height == 0 {
            1.0
        } else {
            self.width as f64 / self.height as f64
        }
    }

    pub fn extent(&self) -> [u32; 2] {
        [self.width, self.height]
    }

    pub fn right(&self) -> u32 {
        self.left + self.width
    }

    pub fn bottom(&self) -> u32 {
        self.top + self.height
    }
}

/// 投影描述：近平面上的视锥边界
///
/// 与 OpenGL `glFrustum` 的参数一致。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    pub left: f64,
    pub right: f64,
    pub bottom: f64,
    pub top: f64,
    pub near: f64,
    pub far: f64,
}

impl Projection {
    /// 对称视锥
    ///
    /// # 参数
    ///
    /// * `fov_y_degrees` - 垂直视场角
    /// * `aspect` - 宽高比
    pub fn symmetric(fov_y_degrees: f64, aspect: f64, near: f64, far: f64) -> Self {
        let top = near * (fov_y_degrees.to_radians() * 0.5).tan();
        let right = top * aspect;
        Self {
            left: -right,
            right,
            bottom: -top,
            top,
            near,
            far,
        }
    }

    /// 右手坐标系、深度映射到 [-1, 1] 的投影矩阵
    pub fn to_matrix(&self) -> Matrix4<f64> {
        let (l, r, b, t, n, f) = (self.left, self.right, self.bottom, self.top, self.near, self.far);
        Matrix4::new(
            2.0 * n / (r - l), 0.0, (r + l) / (r - l), 0.0,
            0.0, 2.0 * n / (t - b), (t + b) / (t - b), 0.0,
            0.0, 0.0, -(f + n) / (f - n), -2.0 * f * n / (f - n),
            0.0, 0.0, -1.0, 0.0,
        )
    }
}

/// 由头部位姿和瞳距推导每只眼睛的位姿
///
/// 双目时 0 号眼在左（-x），1 号眼在右；单目时与头部位姿相同。
pub fn eye_pose(head: &Pose, eye: usize, num_eyes: usize, ipd_meters: f64) -> Pose {
    if num_eyes < 2 {
        return *head;
    }
    let offset = if eye == 0 { -0.5 * ipd_meters } else { 0.5 * ipd_meters };
    *head * Translation3::new(offset, 0.0, 0.0)
}

/// RGB 颜色（范围 0.0-1.0）
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RgbColor {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl RgbColor {
    pub fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    /// 不透明 RGBA
    pub fn rgba(&self) -> [f32; 4] {
        [self.r, self.g, self.b, 1.0]
    }

    pub fn red() -> Self { Self::new(1.0, 0.0, 0.0) }
    pub fn green() -> Self { Self::new(0.0, 1.0, 0.0) }
    pub fn blue() -> Self { Self::new(0.0, 0.0, 1.0) }
}
