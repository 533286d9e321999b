mod metric_derivation;
mod period_calculus;
