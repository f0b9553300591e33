pub const FACE_CASCADE_NAME: &str = "haarcascade_frontalface_default.xml";
pub const FACE_CASCADE_URL: &str =
    "https://raw.githubusercontent.com/opencv/opencv/4.x/data/haarcascades/haarcascade_frontalface_default.xml";

pub const EYE_CASCADE_NAME: &str = "haarcascade_eye.xml";
pub const EYE_CASCADE_URL: &str =
    "https://raw.githubusercontent.com/opencv/opencv/4.x/data/haarcascades/haarcascade_eye.xml";

pub const YUNET_MODEL_NAME: &str = "face_detection_yunet_2023mar.onnx";
pub const YUNET_MODEL_URL: &str =
    "https://github.com/opencv/opencv_zoo/raw/main/models/face_detection_yunet/face_detection_yunet_2023mar.onnx";

/// Directory name used under the platform config and cache roots.
pub const APP_DIR_NAME: &str = "BlinkWatch";

/// Floor on any worker sleep so a slow tick never turns into a busy loop.
pub const MIN_WORKER_SLEEP_SECS: f64 = 0.01;

/// Floor on the delay between failed capture open attempts.
pub const MIN_OPEN_COOLDOWN_MS: u64 = 1000;

/// Frames are only resized when both target dimensions exceed this.
pub const MIN_RESIZE_DIMENSION: u32 = 2;

/// Annotation colours, BGR.
pub const PREFILTER_FACE_COLOR: [u8; 3] = [255, 255, 0];
pub const FACE_COLOR: [u8; 3] = [175, 255, 0];
pub const EYE_AREA_COLOR: [u8; 3] = [125, 255, 0];
pub const PREFILTER_EYE_COLOR: [u8; 3] = [0, 255, 255];
pub const EYE_COLOR: [u8; 3] = [150, 255, 255];
