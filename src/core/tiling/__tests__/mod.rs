mod partition_test;
mod processor_test;
