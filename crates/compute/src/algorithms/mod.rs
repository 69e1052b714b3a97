pub mod isolation_forest;
pub mod kmeans;
pub mod one_class_svm;
