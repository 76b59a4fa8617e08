// ==========================================
// EKAP 招标数据采集系统 - 外部协作方适配层
// ==========================================
// 职责: 浏览器自动化 (WebDriver)、验证码识别 (2captcha)、终端操作员
// 红线: 引擎层只通过 trait 使用本层
// ==========================================

pub mod operator_console;
pub mod two_captcha;
pub mod webdriver;

pub use two_captcha::TwoCaptchaSolver;
pub use webdriver::WebDriverSurface;
