mod handler;
mod model;

pub use handler::{
    advanced_predict,
    predict_battery,
    predict_brand,
    predict_price,
    predict_ram
};
pub use model::PredictionResponse;
