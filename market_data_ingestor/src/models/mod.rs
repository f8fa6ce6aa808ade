pub mod bar;
pub mod bar_series;
pub mod earnings;
pub mod flow;
pub mod request_params;
pub mod timeframe;
