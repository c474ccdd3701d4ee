pub mod autocorrelation;
