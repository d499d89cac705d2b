pub mod residual_extractor;
