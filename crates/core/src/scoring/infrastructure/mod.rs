pub mod onnx_scorer;
